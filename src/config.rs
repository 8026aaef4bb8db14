//! 定义数据库通知器的配置结构体。
//!
//! 外部表示使用 camelCase 字段名（`logLevel`, `driver`, `server`, `database`,
//! `username`, `password`, `tablename`），与测试框架的 runbook 保持一致。

use crate::driver::Identifier;
use crate::error::{NotifierError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ::config::Source;
use std::fmt;
use std::path::Path;

/// Environment prefix used by [`load_layered_config`] when none is given.
pub const DEFAULT_ENV_PREFIX: &str = "DB_NOTIFIER";

/// 日志级别枚举
///
/// A closed set of severities; unknown names are rejected when the
/// configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// The matching `tracing` level.
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = NotifierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "CRITICAL" => Ok(LogLevel::Error),
            _ => Err(NotifierError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// 敏感字符串，`Debug` 与 `Display` 均不输出明文
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plain value. Only connection strings should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A configuration schema that the framework loader can deserialize and
/// validate on behalf of a notifier.
pub trait TypedSchema: serde::de::DeserializeOwned + fmt::Debug + Clone + Send + 'static {
    /// External field names accepted by the schema.
    const FIELDS: &'static [&'static str];

    /// Semantic checks that serde cannot express.
    fn validate(&self) -> Result<()>;
}

/// Runtime description of a schema, used by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    pub type_name: &'static str,
    pub fields: &'static [&'static str],
}

impl SchemaInfo {
    pub fn of<S: TypedSchema>() -> Self {
        Self {
            type_name: std::any::type_name::<S>(),
            fields: S::FIELDS,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(&name)
    }
}

/// 数据库通知器的连接参数。
#[derive(Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DatabaseSchema {
    pub log_level: LogLevel,
    pub driver: String,
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: Secret,
    #[serde(rename = "tablename", alias = "tableName")]
    pub table_name: String,
}

// password 字段由 Secret 自行脱敏
impl fmt::Debug for DatabaseSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSchema")
            .field("log_level", &self.log_level)
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password)
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl TypedSchema for DatabaseSchema {
    const FIELDS: &'static [&'static str] = &[
        "logLevel",
        "driver",
        "server",
        "database",
        "username",
        "password",
        "tablename",
    ];

    fn validate(&self) -> Result<()> {
        validate_config(self)
    }
}

/// 用于从 TOML 文件加载 `DatabaseSchema` 的辅助函数。
pub fn load_config_from_file(path: &Path) -> Result<DatabaseSchema> {
    if !path.exists() {
        return Err(NotifierError::ConfigFileMissing(
            path.to_string_lossy().into_owned(),
        ));
    }

    let config_str = std::fs::read_to_string(path)?;
    load_config_from_str(&config_str)
}

/// 用于从 TOML 字符串加载 `DatabaseSchema` 的辅助函数。
pub fn load_config_from_str(config_str: &str) -> Result<DatabaseSchema> {
    let config: DatabaseSchema = toml::from_str(config_str)
        .map_err(|e| NotifierError::ConfigError(format!("TOML parse failed: {}", e)))?;

    validate_config(&config)?;
    Ok(config)
}

/// Merges an optional TOML file with `<env_prefix>_*` environment variables.
///
/// Environment values win over file values, e.g. `DB_NOTIFIER_PASSWORD`
/// overrides `password`. `env_prefix` defaults to [`DEFAULT_ENV_PREFIX`].
pub fn load_layered_config(
    path: Option<&Path>,
    env_prefix: Option<&str>,
) -> Result<DatabaseSchema> {
    let mut merged = ::config::Map::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(NotifierError::ConfigFileMissing(
                path.to_string_lossy().into_owned(),
            ));
        }
        merge_canonical(&mut merged, ::config::File::from(path).collect()?);
    }

    let env_prefix = env_prefix.unwrap_or(DEFAULT_ENV_PREFIX);
    merge_canonical(
        &mut merged,
        ::config::Environment::with_prefix(env_prefix).collect()?,
    );

    let config: DatabaseSchema =
        ::config::Value::new(None, ::config::ValueKind::Table(merged)).try_deserialize()?;
    validate_config(&config)?;
    Ok(config)
}

/// 环境变量键会被转为小写，这里统一映射回 schema 的外部字段名
fn merge_canonical(
    merged: &mut ::config::Map<String, ::config::Value>,
    source: ::config::Map<String, ::config::Value>,
) {
    for (key, value) in source {
        let key = DatabaseSchema::FIELDS
            .iter()
            .find(|field| field.eq_ignore_ascii_case(&key))
            .map_or(key, |field| field.to_string());
        merged.insert(key, value);
    }
}

/// 验证配置的有效性。
pub fn validate_config(config: &DatabaseSchema) -> Result<()> {
    if config.driver.trim().is_empty() {
        return Err(NotifierError::config("driver must not be empty"));
    }

    if config.database.trim().is_empty() {
        return Err(NotifierError::config("database must not be empty"));
    }

    // 表名会直接出现在 SQL 文本中，必须是合法标识符
    Identifier::new(&config.table_name)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
            logLevel = "INFO"
            driver = "SQLite3"
            server = "db.local"
            database = "testdb"
            username = "u"
            password = "p"
            tablename = "results"
        "#
    }

    #[test]
    fn test_default_config() {
        let config = DatabaseSchema::default();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.driver.is_empty());
        assert!(config.server.is_empty());
        assert!(config.password.is_empty());
        assert!(config.table_name.is_empty());
    }

    #[test]
    fn test_load_config_from_str_camel_case() {
        let config = load_config_from_str(sample_toml()).unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.driver, "SQLite3");
        assert_eq!(config.server, "db.local");
        assert_eq!(config.database, "testdb");
        assert_eq!(config.username, "u");
        assert_eq!(config.password.expose(), "p");
        assert_eq!(config.table_name, "results");
    }

    #[test]
    fn test_log_level_aliases() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("CRITICAL".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!(" Info ".parse::<LogLevel>().unwrap(), LogLevel::Info);
    }

    #[test]
    fn test_unknown_log_level_fails_at_load() {
        let toml_str = sample_toml().replace("\"INFO\"", "\"VERBOSE\"");
        let err = load_config_from_str(&toml_str).unwrap_err();
        match err {
            NotifierError::ConfigError(msg) => {
                assert!(msg.contains("TOML parse failed"));
                assert!(msg.contains("Invalid log level"));
            }
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let toml_str = format!("{}\nport = 1433\n", sample_toml());
        assert!(load_config_from_str(&toml_str).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = load_config_from_str(sample_toml()).unwrap();
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("password: \"p\""));
        assert_eq!(config.password.to_string(), "[REDACTED]");
    }

    #[test]
    fn test_serialize_uses_external_names() {
        let config = load_config_from_str(sample_toml()).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["logLevel"], "INFO");
        assert_eq!(json["tablename"], "results");
        assert!(json.get("tableName").is_none());
    }

    #[test]
    fn test_validate_config_rejects_bad_table_name() {
        let mut config = load_config_from_str(sample_toml()).unwrap();
        config.table_name = "results; drop table users".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(NotifierError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_validate_config_requires_driver_and_database() {
        let mut config = load_config_from_str(sample_toml()).unwrap();
        config.driver = "  ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(NotifierError::ConfigError(_))
        ));

        let mut config = load_config_from_str(sample_toml()).unwrap();
        config.database.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_schema_info_lists_external_fields() {
        let info = SchemaInfo::of::<DatabaseSchema>();
        assert!(info.type_name.ends_with("DatabaseSchema"));
        assert!(info.has_field("logLevel"));
        assert!(info.has_field("tablename"));
        assert!(!info.has_field("table_name"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();

        let config = load_config_from_file(file.path()).unwrap();
        assert_eq!(config.table_name, "results");
    }

    #[test]
    fn test_load_config_from_missing_file() {
        let err = load_config_from_file(Path::new("/nonexistent/notifier.toml")).unwrap_err();
        assert!(matches!(err, NotifierError::ConfigFileMissing(_)));
    }

    #[test]
    fn test_load_layered_config_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();

        std::env::set_var("DBN_LAYERED_TEST_PASSWORD", "from-env");
        let config = load_layered_config(Some(file.path()), Some("DBN_LAYERED_TEST"));
        std::env::remove_var("DBN_LAYERED_TEST_PASSWORD");

        let config = config.unwrap();
        assert_eq!(config.password.expose(), "from-env");
        assert_eq!(config.database, "testdb");
    }

    #[test]
    fn test_load_layered_config_env_overrides_file_log_level() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();

        std::env::set_var("DBN_LEVEL_TEST_LOGLEVEL", "ERROR");
        std::env::set_var("DBN_LEVEL_TEST_TABLENAME", "archive");
        let config = load_layered_config(Some(file.path()), Some("DBN_LEVEL_TEST"));
        std::env::remove_var("DBN_LEVEL_TEST_LOGLEVEL");
        std::env::remove_var("DBN_LEVEL_TEST_TABLENAME");

        let config = config.unwrap();
        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(config.table_name, "archive");
        assert_eq!(config.server, "db.local");
    }

    #[test]
    fn test_load_layered_config_file_alias_overridden_by_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let toml_str = sample_toml().replace("tablename", "tableName");
        file.write_all(toml_str.as_bytes()).unwrap();

        std::env::set_var("DBN_ALIAS_TEST_TABLENAME", "history");
        let config = load_layered_config(Some(file.path()), Some("DBN_ALIAS_TEST"));
        std::env::remove_var("DBN_ALIAS_TEST_TABLENAME");

        assert_eq!(config.unwrap().table_name, "history");
    }

    #[test]
    fn test_load_layered_config_default_prefix() {
        std::env::set_var("DB_NOTIFIER_DRIVER", "SQLite3");
        std::env::set_var("DB_NOTIFIER_DATABASE", ":memory:");
        std::env::set_var("DB_NOTIFIER_TABLENAME", "results");
        let config = load_layered_config(None, None);
        for key in ["DB_NOTIFIER_DRIVER", "DB_NOTIFIER_DATABASE", "DB_NOTIFIER_TABLENAME"] {
            std::env::remove_var(key);
        }

        let config = config.unwrap();
        assert_eq!(config.driver, "SQLite3");
        assert_eq!(config.database, ":memory:");
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_load_layered_config_missing_file() {
        let path = Path::new("/nonexistent/layered.toml");
        let err = load_layered_config(Some(path), Some("DBN_MISSING")).unwrap_err();
        assert!(matches!(err, NotifierError::ConfigFileMissing(_)));
    }
}
