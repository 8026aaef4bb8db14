//! 通知器注册表
//!
//! Maps a notifier type name to its schema and a constructor. The framework
//! hands the registry one runbook section per notifier and gets back a
//! ready-to-initialize trait object.

use crate::config::{SchemaInfo, TypedSchema};
use crate::driver::DatabaseDriver;
use crate::error::{NotifierError, Result};
use crate::logging::NotifierLogger;
use crate::notifier::{DatabaseNotifier, Notifier, NotifierDyn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key that names the notifier type inside a runbook section.
pub const TYPE_KEY: &str = "type";

/// Runbook array holding one table per notifier.
pub const RUNBOOK_KEY: &str = "notifier";

/// 构建通知器时注入的依赖
#[derive(Debug, Clone)]
pub struct NotifierContext {
    pub driver: Arc<dyn DatabaseDriver>,
    pub logger: NotifierLogger,
}

impl NotifierContext {
    pub fn new(driver: Arc<dyn DatabaseDriver>, logger: NotifierLogger) -> Self {
        Self { driver, logger }
    }
}

/// 通知器工厂 trait
///
/// Builds an instance from an already validated schema.
pub trait NotifierFactory: Notifier + Sized + 'static {
    fn create(schema: Self::Schema, context: &NotifierContext) -> Result<Self>;
}

impl NotifierFactory for DatabaseNotifier {
    fn create(schema: Self::Schema, context: &NotifierContext) -> Result<Self> {
        DatabaseNotifier::new(schema, Arc::clone(&context.driver), context.logger.clone())
    }
}

type BuildFn = fn(toml::Value, &NotifierContext) -> Result<Box<dyn NotifierDyn>>;

struct Registration {
    schema: SchemaInfo,
    build: BuildFn,
}

fn build<N: NotifierFactory>(
    section: toml::Value,
    context: &NotifierContext,
) -> Result<Box<dyn NotifierDyn>> {
    let schema = <N::Schema as Deserialize>::deserialize(section).map_err(|e| {
        NotifierError::config(format!("invalid {} section: {}", N::type_name(), e))
    })?;
    schema.validate()?;
    Ok(Box::new(N::create(schema, context)?))
}

/// 注册表
#[derive(Default)]
pub struct NotifierRegistry {
    registrations: BTreeMap<&'static str, Registration>,
}

impl std::fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `database` notifier.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.registrations.insert(
            DatabaseNotifier::TYPE_NAME,
            Registration {
                schema: DatabaseNotifier::type_schema(),
                build: build::<DatabaseNotifier>,
            },
        );
        registry
    }

    /// Registers `N` under its type name.
    pub fn register<N: NotifierFactory>(&mut self) -> Result<()> {
        let type_name = N::type_name();
        if self.registrations.contains_key(type_name) {
            return Err(NotifierError::DuplicateNotifier(type_name.to_string()));
        }

        self.registrations.insert(
            type_name,
            Registration {
                schema: N::type_schema(),
                build: build::<N>,
            },
        );
        Ok(())
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.registrations.keys().copied().collect()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.registrations.contains_key(type_name)
    }

    pub fn schema(&self, type_name: &str) -> Option<&SchemaInfo> {
        self.registrations.get(type_name).map(|r| &r.schema)
    }

    /// Builds the notifier registered as `type_name` from its runbook section.
    ///
    /// A `type` key in the section is accepted if it matches `type_name`.
    pub fn create(
        &self,
        type_name: &str,
        section: toml::Value,
        context: &NotifierContext,
    ) -> Result<Box<dyn NotifierDyn>> {
        let registration = self
            .registrations
            .get(type_name)
            .ok_or_else(|| NotifierError::UnknownNotifier(type_name.to_string()))?;

        let section = match section {
            toml::Value::Table(mut table) => {
                if let Some(declared) = table.remove(TYPE_KEY) {
                    if declared.as_str() != Some(type_name) {
                        return Err(NotifierError::config(format!(
                            "section declares type {} but was routed to {}",
                            declared, type_name
                        )));
                    }
                }
                toml::Value::Table(table)
            }
            other => {
                return Err(NotifierError::config(format!(
                    "{} section must be a table, got {}",
                    type_name,
                    other.type_str()
                )))
            }
        };

        (registration.build)(section, context)
    }

    /// Builds every notifier listed in a runbook's `[[notifier]]` array.
    ///
    /// Each entry names its kind with the `type` key.
    pub fn create_from_runbook(
        &self,
        runbook: &str,
        context: &NotifierContext,
    ) -> Result<Vec<Box<dyn NotifierDyn>>> {
        let mut document: toml::Table = toml::from_str(runbook)?;
        let entries = match document.remove(RUNBOOK_KEY) {
            None => return Ok(Vec::new()),
            Some(toml::Value::Array(entries)) => entries,
            Some(other) => {
                return Err(NotifierError::config(format!(
                    "{} must be an array of tables, got {}",
                    RUNBOOK_KEY,
                    other.type_str()
                )))
            }
        };

        entries
            .into_iter()
            .map(|entry| {
                let type_name = entry
                    .get(TYPE_KEY)
                    .and_then(toml::Value::as_str)
                    .ok_or_else(|| {
                        NotifierError::config(format!(
                            "{} entry is missing a {} key",
                            RUNBOOK_KEY, TYPE_KEY
                        ))
                    })?
                    .to_string();
                self.create(&type_name, entry, context)
            })
            .collect()
    }
}
