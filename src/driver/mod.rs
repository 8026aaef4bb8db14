//! 数据库驱动抽象
//!
//! The notifier treats the database as an opaque capability: a driver
//! `connect`s with a connection string and yields a session that can
//! `execute` bound-parameter statements, `commit` and `close`.
//!
//! Two drivers ship with the crate:
//! - [`sqlite::SqliteDriver`] (feature `sqlite`, on by default)
//! - [`recording::RecordingDriver`], which records every call and never
//!   touches a database

pub mod recording;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::config::DatabaseSchema;
use crate::error::{NotifierError, Result};
use std::fmt;
use thiserror::Error;

pub use recording::{DriverCall, RecordingDriver};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

/// Errors reported by driver implementations
#[derive(Error, Debug)]
pub enum DriverError {
    /// The connection string is missing a required attribute or is malformed
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The driver named in the connection string is not handled here
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// Network or authentication step failed
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Statement execution failed
    #[error("Statement failed: {0}")]
    Execute(String),

    /// Commit failed
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Close failed
    #[error("Close failed: {0}")]
    Close(String),

    /// SQLite errors
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },
}

/// Opens sessions against one kind of database.
pub trait DatabaseDriver: Send + Sync + fmt::Debug {
    /// 驱动名称，用于日志
    fn name(&self) -> &str;

    /// Opens a session. Exactly one connection attempt, no retry.
    fn connect(
        &self,
        connection_string: &ConnectionString,
    ) -> std::result::Result<Box<dyn DatabaseSession>, DriverError>;
}

/// An open database session with its statement-execution context.
///
/// A session is not safe for concurrent use; it is owned by exactly one
/// notifier.
pub trait DatabaseSession: Send + fmt::Debug {
    /// Executes one statement. Statements that produce no rows return an
    /// empty result set.
    fn execute(&mut self, statement: &Statement) -> std::result::Result<ResultSet, DriverError>;

    fn commit(&mut self) -> std::result::Result<(), DriverError>;

    /// Releases the session.
    fn close(self: Box<Self>) -> std::result::Result<(), DriverError>;
}

/// A single SQL value, either bound into a statement or read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Blob(bytes) => {
                f.write_str("x'")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                f.write_str("'")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

/// A validated table or column name.
///
/// Identifiers cannot be bound as parameters, so only plain names
/// (`[A-Za-z_][A-Za-z0-9_]*`) are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(name.to_string()))
        } else {
            Err(NotifierError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SQL text with `?` placeholders plus the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// `select * from <table> where <column>=?`
    pub fn select_by_column(table: &Identifier, column: &Identifier, value: Value) -> Self {
        Self::new(format!("select * from {} where {}=?", table, column)).bind(value)
    }

    /// `insert into <table> values (?, ...)`, one placeholder per value.
    pub fn insert_values(table: &Identifier, values: &[Value]) -> Result<Self> {
        if values.is_empty() {
            return Err(NotifierError::InvalidStatement(
                "insert requires at least one value".to_string(),
            ));
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let mut statement = Self::new(format!("insert into {} values ({})", table, placeholders));
        statement.params.extend(values.iter().cloned());
        Ok(statement)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// 语句是否以 select 开头
    pub fn is_query(&self) -> bool {
        self.sql
            .trim_start()
            .get(..6)
            .is_some_and(|head| head.eq_ignore_ascii_case("select"))
    }
}

/// Renders the statement with its parameters substituted, for logs and
/// diagnostics only. Execution always uses [`Statement::sql`] plus
/// [`Statement::params`].
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params = self.params.iter();
        for (i, part) in self.sql.split('?').enumerate() {
            if i > 0 {
                match params.next() {
                    Some(value) => write!(f, "{}", value)?,
                    None => f.write_str("?")?,
                }
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

/// One result row, as an ordered tuple of column values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Finite, single-pass sequence of rows produced by one statement.
#[derive(Debug)]
pub struct ResultSet {
    rows: std::vec::IntoIter<Row>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::from_rows(Vec::new())
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl Iterator for ResultSet {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ResultSet {}

/// Driver connection string of the form
/// `DRIVER={<driver>};SERVER=<server>;DATABASE=<database>;UID=<user>;PWD=<password>`.
///
/// `Display` and `Debug` mask the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    attributes: Vec<(String, String)>,
}

impl ConnectionString {
    pub const DRIVER: &'static str = "DRIVER";
    pub const SERVER: &'static str = "SERVER";
    pub const DATABASE: &'static str = "DATABASE";
    pub const UID: &'static str = "UID";
    pub const PWD: &'static str = "PWD";

    pub fn from_schema(schema: &DatabaseSchema) -> Self {
        Self {
            attributes: vec![
                (Self::DRIVER.to_string(), schema.driver.clone()),
                (Self::SERVER.to_string(), schema.server.clone()),
                (Self::DATABASE.to_string(), schema.database.clone()),
                (Self::UID.to_string(), schema.username.clone()),
                (Self::PWD.to_string(), schema.password.expose().to_string()),
            ],
        }
    }

    /// Parses `KEY=value;KEY={value}` pairs. Keys are case-insensitive.
    pub fn parse(raw: &str) -> std::result::Result<Self, DriverError> {
        let mut attributes = Vec::new();
        for pair in raw.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                DriverError::InvalidConnectionString(format!("missing '=' in {:?}", pair))
            })?;
            let value = value
                .strip_prefix('{')
                .and_then(|v| v.strip_suffix('}'))
                .unwrap_or(value);
            attributes.push((key.trim().to_uppercase(), value.to_string()));
        }
        Ok(Self { attributes })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn driver(&self) -> Option<&str> {
        self.get(Self::DRIVER)
    }

    /// 完整连接字符串（包含明文密码），只应交给驱动。
    pub fn to_odbc_string(&self) -> String {
        self.render(false)
    }

    fn render(&self, mask_password: bool) -> String {
        self.attributes
            .iter()
            .map(|(key, value)| {
                if mask_password && key == Self::PWD {
                    format!("{}=[REDACTED]", key)
                } else if key == Self::DRIVER {
                    format!("{}={{{}}}", key, value)
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString")
            .field(&self.render(true))
            .finish()
    }
}
