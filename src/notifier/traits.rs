//! Notifier Traits
//!
//! 定义了框架与通知器之间的统一接口。
//!
//! # 架构设计
//!
//! - `Notifier`: 基础 trait，带有关联的配置 schema 类型
//! - `NotifierDyn`: 对象安全的动态接口，供注册表与运行器以 trait 对象持有
//!
//! # 生命周期
//!
//! `Uninitialized` → `initialize` → `Active` → `finalize` → `Finalized`.
//! Messages are only handled while `Active`.
//!
//! # 使用示例
//!
//! ```rust
//! use db_notifier::config::{SchemaInfo, TypedSchema};
//! use db_notifier::message::{Message, MessageType};
//! use db_notifier::notifier::{Notifier, NotifierState};
//! use db_notifier::Result;
//! use serde::Deserialize;
//! use std::collections::BTreeSet;
//!
//! #[derive(Debug, Clone, Deserialize)]
//! struct CountingSchema {}
//!
//! impl TypedSchema for CountingSchema {
//!     const FIELDS: &'static [&'static str] = &[];
//!     fn validate(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug, Default)]
//! struct CountingNotifier {
//!     state: NotifierState,
//!     received: usize,
//! }
//!
//! impl Notifier for CountingNotifier {
//!     type Schema = CountingSchema;
//!
//!     fn type_name() -> &'static str {
//!         "counting"
//!     }
//!
//!     fn initialize(&mut self) -> Result<()> {
//!         self.state = NotifierState::Active;
//!         Ok(())
//!     }
//!
//!     fn finalize(&mut self) -> Result<()> {
//!         self.state = NotifierState::Finalized;
//!         Ok(())
//!     }
//!
//!     fn subscribed_message_types(&self) -> BTreeSet<MessageType> {
//!         BTreeSet::from([MessageType::TestRun])
//!     }
//!
//!     fn receive_message(&mut self, _message: &Message) -> Result<()> {
//!         self.received += 1;
//!         Ok(())
//!     }
//!
//!     fn state(&self) -> NotifierState {
//!         self.state
//!     }
//! }
//!
//! assert_eq!(CountingNotifier::type_schema(), SchemaInfo::of::<CountingSchema>());
//! ```

use crate::config::{SchemaInfo, TypedSchema};
use crate::error::Result;
use crate::message::{Message, MessageType};
use std::collections::BTreeSet;
use std::fmt::{self, Debug};

/// 通知器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NotifierState {
    #[default]
    Uninitialized,
    Active,
    Finalized,
}

impl fmt::Display for NotifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotifierState::Uninitialized => "Uninitialized",
            NotifierState::Active => "Active",
            NotifierState::Finalized => "Finalized",
        };
        f.write_str(name)
    }
}

/// 基础 Notifier trait
///
/// All calls are blocking. The framework calls `initialize` once, then
/// delivers messages one at a time, then calls `finalize` once.
pub trait Notifier: Send + Debug {
    /// 配置 schema 类型，由框架的配置加载器反序列化
    type Schema: TypedSchema;

    /// Stable identifier the registry uses to route configuration here.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Shape of the configuration schema.
    fn type_schema() -> SchemaInfo
    where
        Self: Sized,
    {
        SchemaInfo::of::<Self::Schema>()
    }

    /// Acquires resources. Called exactly once before any message.
    fn initialize(&mut self) -> Result<()>;

    /// Releases resources. Called exactly once at the end of the run.
    fn finalize(&mut self) -> Result<()>;

    /// Message kinds the bus should deliver to this notifier.
    fn subscribed_message_types(&self) -> BTreeSet<MessageType>;

    /// Handles one delivered message.
    fn receive_message(&mut self, message: &Message) -> Result<()>;

    fn state(&self) -> NotifierState;

    fn is_subscribed(&self, message_type: MessageType) -> bool {
        self.subscribed_message_types().contains(&message_type)
    }

    /// 获取通知器的统计信息
    fn stats(&self) -> String {
        format!("Notifier state: {}", self.state())
    }
}

/// 对象安全的统一 Notifier 动态接口，用于在运行时以 trait 对象管理不同 Schema 的通知器
pub trait NotifierDyn: Send + Debug {
    fn type_name_dyn(&self) -> &'static str;
    fn type_schema_dyn(&self) -> SchemaInfo;
    fn initialize_dyn(&mut self) -> Result<()>;
    fn finalize_dyn(&mut self) -> Result<()>;
    fn subscribed_message_types_dyn(&self) -> BTreeSet<MessageType>;
    fn receive_message_dyn(&mut self, message: &Message) -> Result<()>;
    fn state_dyn(&self) -> NotifierState;
    fn stats_dyn(&self) -> String;
}

impl<T> NotifierDyn for T
where
    T: Notifier,
{
    fn type_name_dyn(&self) -> &'static str {
        T::type_name()
    }

    fn type_schema_dyn(&self) -> SchemaInfo {
        T::type_schema()
    }

    fn initialize_dyn(&mut self) -> Result<()> {
        self.initialize()
    }

    fn finalize_dyn(&mut self) -> Result<()> {
        self.finalize()
    }

    fn subscribed_message_types_dyn(&self) -> BTreeSet<MessageType> {
        self.subscribed_message_types()
    }

    fn receive_message_dyn(&mut self, message: &Message) -> Result<()> {
        self.receive_message(message)
    }

    fn state_dyn(&self) -> NotifierState {
        self.state()
    }

    fn stats_dyn(&self) -> String {
        self.stats()
    }
}
