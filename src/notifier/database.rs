//! 数据库通知器
//!
//! Subscribes to test-result messages. For every delivered message it issues
//! a fixed lookup (`ID = 1`) against the configured table and logs the
//! message at the configured level. The lookup does not depend on message
//! content.

use crate::config::{validate_config, DatabaseSchema};
use crate::diagnostics::{DiagnosticsSnapshot, NotifierDiagnostics};
use crate::driver::{
    ConnectionString, DatabaseDriver, DatabaseSession, Identifier, ResultSet, Statement, Value,
};
use crate::error::{NotifierError, Result};
use crate::logging::NotifierLogger;
use crate::message::{Message, MessageType};
use crate::notifier::{Notifier, NotifierState};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Column and value of the per-message lookup.
const LOOKUP_COLUMN: &str = "ID";
const LOOKUP_VALUE: &str = "1";

/// 数据库通知器结构体
///
/// Owns at most one open session. The session exists exactly while the
/// notifier is [`NotifierState::Active`]; dropping an active notifier closes
/// it.
pub struct DatabaseNotifier {
    /// 配置信息
    config: DatabaseSchema,
    /// 已校验的表名
    table: Identifier,
    driver: Arc<dyn DatabaseDriver>,
    logger: NotifierLogger,
    session: Option<Box<dyn DatabaseSession>>,
    state: NotifierState,
    diagnostics: NotifierDiagnostics,
}

impl fmt::Debug for DatabaseNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseNotifier")
            .field("config", &self.config)
            .field("driver", &self.driver.name())
            .field("state", &self.state)
            .field("session", &self.session.as_ref().map(|_| "<DatabaseSession>"))
            .finish()
    }
}

impl DatabaseNotifier {
    pub const TYPE_NAME: &'static str = "database";

    /// Creates an uninitialized notifier.
    ///
    /// Fails if the configuration does not validate, e.g. the table name is
    /// not a plain SQL identifier.
    pub fn new(
        config: DatabaseSchema,
        driver: Arc<dyn DatabaseDriver>,
        logger: NotifierLogger,
    ) -> Result<Self> {
        validate_config(&config)?;
        let table = Identifier::new(&config.table_name)?;

        Ok(Self {
            config,
            table,
            driver,
            logger,
            session: None,
            state: NotifierState::Uninitialized,
            diagnostics: NotifierDiagnostics::new(),
        })
    }

    pub fn config(&self) -> &DatabaseSchema {
        &self.config
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Inserts one row carrying `values` as a single bound value, then
    /// commits.
    pub fn insert_row(&mut self, values: &str) -> Result<()> {
        self.insert_values(&[Value::from(values)])
    }

    /// Inserts one row with one bound value per element, then commits.
    ///
    /// No column list is emitted, so the values must match the table's
    /// column order.
    pub fn insert_values(&mut self, values: &[Value]) -> Result<()> {
        self.ensure_active("insert_row")?;
        let statement = Statement::insert_values(&self.table, values)?;
        self.execute("insert_row", &statement)?;
        self.commit("insert_row")
    }

    /// Runs `select * from <table> where <column>=?` with `value` bound.
    pub fn select_by_column(&mut self, column: &str, value: &str) -> Result<ResultSet> {
        self.ensure_active("select_by_column")?;
        let column = Identifier::new(column)?;
        let statement = Statement::select_by_column(&self.table, &column, Value::from(value));
        self.execute("select_by_column", &statement)
    }

    /// Updating rows is not supported; this never touches the database.
    pub fn update_table(&mut self, _records: &str) {}

    fn ensure_active(&self, operation: &'static str) -> Result<()> {
        match self.state {
            NotifierState::Active => Ok(()),
            state => Err(NotifierError::invalid_state(operation, state)),
        }
    }

    fn session_mut(&mut self, operation: &'static str) -> Result<&mut Box<dyn DatabaseSession>> {
        let state = self.state;
        self.session
            .as_mut()
            .ok_or_else(|| NotifierError::invalid_state(operation, state))
    }

    fn execute(&mut self, operation: &'static str, statement: &Statement) -> Result<ResultSet> {
        let result = self.session_mut(operation)?.execute(statement);
        match result {
            Ok(rows) => {
                self.diagnostics.increment_statements_executed();
                Ok(rows)
            }
            Err(e) => {
                self.diagnostics.increment_errors();
                Err(NotifierError::persistence(e))
            }
        }
    }

    fn commit(&mut self, operation: &'static str) -> Result<()> {
        let result = self.session_mut(operation)?.commit();
        match result {
            Ok(()) => {
                self.diagnostics.increment_commits();
                Ok(())
            }
            Err(e) => {
                self.diagnostics.increment_errors();
                Err(NotifierError::persistence(e))
            }
        }
    }
}

impl Notifier for DatabaseNotifier {
    type Schema = DatabaseSchema;

    fn type_name() -> &'static str {
        Self::TYPE_NAME
    }

    fn initialize(&mut self) -> Result<()> {
        if self.state != NotifierState::Uninitialized {
            return Err(NotifierError::AlreadyInitialized);
        }

        let connection_string = ConnectionString::from_schema(&self.config);
        self.logger.in_scope(|| {
            debug!(
                driver = %self.driver.name(),
                connection = %connection_string,
                "正在打开数据库会话"
            )
        });

        let session = self.driver.connect(&connection_string).map_err(|e| {
            self.diagnostics.increment_errors();
            NotifierError::connection(e)
        })?;

        self.session = Some(session);
        self.state = NotifierState::Active;
        self.logger.in_scope(|| {
            info!(
                server = %self.config.server,
                database = %self.config.database,
                table = %self.table,
                "数据库通知器已初始化"
            )
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.state != NotifierState::Active {
            return Err(NotifierError::invalid_state("finalize", self.state));
        }

        // 无论关闭是否成功，会话都已被移出，状态进入 Finalized
        self.state = NotifierState::Finalized;
        let session = self.session.take();
        if let Some(session) = session {
            session.close().map_err(|e| {
                self.diagnostics.increment_errors();
                NotifierError::persistence(e)
            })?;
        }

        self.logger
            .in_scope(|| info!(stats = %self.diagnostics.snapshot(), "数据库通知器已关闭"));
        Ok(())
    }

    fn subscribed_message_types(&self) -> BTreeSet<MessageType> {
        BTreeSet::from([MessageType::TestResult])
    }

    fn receive_message(&mut self, message: &Message) -> Result<()> {
        self.ensure_active("receive_message")?;

        let message_type = message.message_type();
        if !self.is_subscribed(message_type) {
            return Err(NotifierError::UnsubscribedMessage(message_type));
        }

        self.diagnostics.increment_messages_received();
        // 结果只需扫描一遍
        self.select_by_column(LOOKUP_COLUMN, LOOKUP_VALUE)?.for_each(drop);

        self.logger
            .message(self.config.log_level, message_type, &message.to_string());
        Ok(())
    }

    fn state(&self) -> NotifierState {
        self.state
    }

    fn stats(&self) -> String {
        format!(
            "DatabaseNotifier[{}]: {}, {}",
            self.table,
            self.state,
            self.diagnostics.snapshot()
        )
    }
}

impl Drop for DatabaseNotifier {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.state = NotifierState::Finalized;
            if let Err(e) = session.close() {
                self.logger
                    .in_scope(|| warn!(error = %e, "释放时关闭数据库会话失败"));
            }
        }
    }
}
