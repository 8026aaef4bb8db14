//! SQLite 驱动
//!
//! Maps the connection string onto a local SQLite database: `DATABASE` is the
//! file path (`:memory:` for an in-memory database). SQLite has no server or
//! credentials, so `SERVER`, `UID` and `PWD` are accepted and ignored.
//!
//! Writes run inside an implicit transaction that stays open until
//! [`DatabaseSession::commit`], matching drivers with autocommit disabled.

use super::{
    ConnectionString, DatabaseDriver, DatabaseSession, DriverError, ResultSet, Row, Statement,
    Value,
};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use tracing::debug;

/// Driver names this driver answers to (case-insensitive).
const DRIVER_NAMES: &[&str] = &["sqlite", "sqlite3"];

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }

    pub fn accepts(driver: &str) -> bool {
        DRIVER_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(driver.trim()))
    }
}

impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(
        &self,
        connection_string: &ConnectionString,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let driver = connection_string.driver().unwrap_or_default();
        if !Self::accepts(driver) {
            return Err(DriverError::UnsupportedDriver(driver.to_string()));
        }

        let database = connection_string
            .get(ConnectionString::DATABASE)
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                DriverError::InvalidConnectionString("DATABASE attribute is required".to_string())
            })?;

        let conn = if database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(database)
        }
        .map_err(|e| DriverError::Connect(format!("failed to open {:?}: {}", database, e)))?;

        debug!(database = %database, "SQLite 会话已打开");
        Ok(Box::new(SqliteSession { conn }))
    }
}

#[derive(Debug)]
struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    fn begin_if_needed(&self) -> Result<(), DriverError> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl DatabaseSession for SqliteSession {
    fn execute(&mut self, statement: &Statement) -> Result<ResultSet, DriverError> {
        let mut prepared = self
            .conn
            .prepare(statement.sql())
            .map_err(|e| DriverError::Execute(format!("{}: {}", statement.sql(), e)))?;

        let params = rusqlite::params_from_iter(statement.params().iter());
        let column_count = prepared.column_count();

        if column_count == 0 {
            if !prepared.readonly() {
                self.begin_if_needed()?;
            }
            prepared
                .execute(params)
                .map_err(|e| DriverError::Execute(format!("{}: {}", statement.sql(), e)))?;
            return Ok(ResultSet::empty());
        }

        let mut rows = prepared.query(params)?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(from_value_ref(row.get_ref(index)?));
            }
            collected.push(Row::new(values));
        }

        Ok(ResultSet::from_rows(collected))
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        if !self.conn.is_autocommit() {
            self.conn
                .execute_batch("COMMIT")
                .map_err(|e| DriverError::Commit(e.to_string()))?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        // 未提交的事务随连接关闭而回滚
        self.conn
            .close()
            .map_err(|(_, e)| DriverError::Close(e.to_string()))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(v) => ToSqlOutput::from(*v),
            Value::Real(v) => ToSqlOutput::from(*v),
            Value::Text(v) => ToSqlOutput::from(v.as_str()),
            Value::Blob(v) => ToSqlOutput::from(v.as_slice()),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}
