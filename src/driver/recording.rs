//! Recording driver
//!
//! Records every capability call in a shared journal instead of talking to a
//! database. Select statements return the configured canned rows. Useful for
//! dry runs and for asserting exactly which statements a notifier issues.

use super::{
    ConnectionString, DatabaseDriver, DatabaseSession, DriverError, ResultSet, Row, Statement,
};
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Connect(ConnectionString),
    Execute(Statement),
    Commit,
    Close,
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<DriverCall>,
}

/// 记录型驱动，克隆体共享同一份调用日志
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    journal: Arc<Mutex<Journal>>,
    rows: Vec<Row>,
    connect_failure: Option<String>,
    execute_failure: Option<String>,
    commit_failure: Option<String>,
    close_failure: Option<String>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every select statement.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Makes `connect` fail with the given reason.
    pub fn failing_connect(mut self, reason: impl Into<String>) -> Self {
        self.connect_failure = Some(reason.into());
        self
    }

    /// Makes every `execute` fail with the given reason. The attempt is
    /// still recorded.
    pub fn failing_execute(mut self, reason: impl Into<String>) -> Self {
        self.execute_failure = Some(reason.into());
        self
    }

    /// Makes every `commit` fail. The attempt is still recorded.
    pub fn failing_commit(mut self, reason: impl Into<String>) -> Self {
        self.commit_failure = Some(reason.into());
        self
    }

    /// Makes `close` fail. The attempt is still recorded.
    pub fn failing_close(mut self, reason: impl Into<String>) -> Self {
        self.close_failure = Some(reason.into());
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.journal).calls.clone()
    }

    pub fn executed(&self) -> Vec<Statement> {
        lock(&self.journal)
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Execute(statement) => Some(statement.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connections(&self) -> Vec<ConnectionString> {
        lock(&self.journal)
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Connect(conn) => Some(conn.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Connect(_)))
    }

    pub fn commit_count(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Commit))
    }

    pub fn close_count(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Close))
    }

    fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        lock(&self.journal)
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }
}

fn lock(journal: &Mutex<Journal>) -> MutexGuard<'_, Journal> {
    // 日志只追加，中毒后的数据仍然可用
    journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DatabaseDriver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    fn connect(
        &self,
        connection_string: &ConnectionString,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        lock(&self.journal)
            .calls
            .push(DriverCall::Connect(connection_string.clone()));

        if let Some(ref reason) = self.connect_failure {
            return Err(DriverError::Connect(reason.clone()));
        }

        Ok(Box::new(RecordingSession {
            journal: Arc::clone(&self.journal),
            rows: self.rows.clone(),
            execute_failure: self.execute_failure.clone(),
            commit_failure: self.commit_failure.clone(),
            close_failure: self.close_failure.clone(),
        }))
    }
}

#[derive(Debug)]
struct RecordingSession {
    journal: Arc<Mutex<Journal>>,
    rows: Vec<Row>,
    execute_failure: Option<String>,
    commit_failure: Option<String>,
    close_failure: Option<String>,
}

impl DatabaseSession for RecordingSession {
    fn execute(&mut self, statement: &Statement) -> Result<ResultSet, DriverError> {
        lock(&self.journal)
            .calls
            .push(DriverCall::Execute(statement.clone()));

        if let Some(ref reason) = self.execute_failure {
            return Err(DriverError::Execute(reason.clone()));
        }

        if statement.is_query() {
            Ok(ResultSet::from_rows(self.rows.clone()))
        } else {
            Ok(ResultSet::empty())
        }
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        lock(&self.journal).calls.push(DriverCall::Commit);
        match self.commit_failure {
            Some(ref reason) => Err(DriverError::Commit(reason.clone())),
            None => Ok(()),
        }
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        lock(&self.journal).calls.push(DriverCall::Close);
        match self.close_failure {
            Some(reason) => Err(DriverError::Close(reason)),
            None => Ok(()),
        }
    }
}
