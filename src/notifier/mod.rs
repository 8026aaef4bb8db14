//! 通知器模块
//!
//! [`Notifier`] is the contract between the framework and a notifier;
//! [`DatabaseNotifier`] is the database-backed implementation.

pub mod database;
pub mod traits;

pub use database::DatabaseNotifier;
pub use traits::{Notifier, NotifierDyn, NotifierState};
