//! db_notifier - 测试编排框架的数据库通知器
//!
//! 订阅测试结果消息，在每条消息到达时对配置的表执行固定查询，
//! 并按配置的日志级别记录该消息。
//!
//! # 快速开始
//!
//! ```rust
//! use db_notifier::driver::RecordingDriver;
//! use db_notifier::logging::NotifierLogger;
//! use db_notifier::message::{TestResultMessage, TestStatus};
//! use db_notifier::notifier::{DatabaseNotifier, Notifier};
//! use db_notifier::load_config_from_str;
//! use std::sync::Arc;
//!
//! fn main() -> db_notifier::Result<()> {
//!     let config = load_config_from_str(
//!         r#"
//!         logLevel = "INFO"
//!         driver = "TestDriver"
//!         server = "db.local"
//!         database = "testdb"
//!         username = "u"
//!         password = "p"
//!         tablename = "results"
//!         "#,
//!     )?;
//!
//!     let driver = RecordingDriver::new();
//!     let mut notifier =
//!         DatabaseNotifier::new(config, Arc::new(driver.clone()), NotifierLogger::current())?;
//!
//!     notifier.initialize()?;
//!     notifier.receive_message(&TestResultMessage::new("1", "case1", TestStatus::Passed).into())?;
//!     notifier.finalize()?;
//!
//!     assert_eq!(driver.executed()[0].to_string(), "select * from results where ID=1");
//!     Ok(())
//! }
//! ```
//!
//! # 在 tokio 中运行
//!
//! [`runner::spawn_notifier`] hosts a notifier built by the
//! [`registry::NotifierRegistry`] and feeds it from an `mpsc` channel.

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod logging;
pub mod message;
pub mod notifier;
pub mod registry;
pub mod runner;

// 重新导出主要类型
pub use config::{
    load_config_from_file, load_config_from_str, load_layered_config, DatabaseSchema, LogLevel,
    Secret, DEFAULT_ENV_PREFIX,
};
pub use diagnostics::DiagnosticsSnapshot;
pub use driver::{
    ConnectionString, DatabaseDriver, DatabaseSession, DriverError, Identifier, ResultSet, Row,
    Statement, Value,
};
pub use error::{NotifierError, Result};
pub use logging::NotifierLogger;
pub use message::{Message, MessageType};
pub use notifier::{DatabaseNotifier, Notifier, NotifierDyn, NotifierState};
pub use registry::{NotifierContext, NotifierFactory, NotifierRegistry};
pub use runner::{spawn_notifier, RunSummary};

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
