//! 通知器日志
//!
//! The notifier does not touch process-wide logging state. It owns a
//! [`NotifierLogger`], a handle to a `tracing` dispatcher injected at
//! construction, and every record it emits goes through that dispatcher.

use crate::config::LogLevel;
use crate::message::MessageType;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Target used for message records.
pub const MESSAGE_TARGET: &str = "db_notifier::message";

#[derive(Debug, Clone)]
pub struct NotifierLogger {
    dispatch: Dispatch,
}

impl NotifierLogger {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Uses whatever dispatcher is the default for the calling thread.
    pub fn current() -> Self {
        Self::new(tracing::dispatcher::get_default(|dispatch| dispatch.clone()))
    }

    /// A logger that discards everything.
    pub fn disabled() -> Self {
        Self::new(Dispatch::none())
    }

    /// A plain-text `tracing-subscriber` fmt logger writing to `make_writer`,
    /// keeping records at `max_level` and above.
    pub fn fmt_writer<W>(make_writer: W, max_level: LogLevel) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(make_writer)
            .with_max_level(max_level.as_tracing())
            .with_ansi(false)
            .with_target(true)
            .finish();
        Self::new(Dispatch::new(subscriber))
    }

    /// 标准输出日志，过滤规则取自 `RUST_LOG`，未设置时使用 `default_level`
    pub fn stdout(default_level: LogLevel) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .finish();
        Self::new(Dispatch::new(subscriber))
    }

    /// Runs `f` with this logger's dispatcher as the default, so plain
    /// `tracing` macros inside `f` land here.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Emits one record for a received message at the given level.
    pub fn message(&self, level: LogLevel, message_type: MessageType, text: &str) {
        self.in_scope(|| match level {
            LogLevel::Trace => tracing::trace!(
                target: MESSAGE_TARGET,
                "received message [{}]: {}",
                message_type,
                text
            ),
            LogLevel::Debug => tracing::debug!(
                target: MESSAGE_TARGET,
                "received message [{}]: {}",
                message_type,
                text
            ),
            LogLevel::Info => tracing::info!(
                target: MESSAGE_TARGET,
                "received message [{}]: {}",
                message_type,
                text
            ),
            LogLevel::Warn => tracing::warn!(
                target: MESSAGE_TARGET,
                "received message [{}]: {}",
                message_type,
                text
            ),
            LogLevel::Error => tracing::error!(
                target: MESSAGE_TARGET,
                "received message [{}]: {}",
                message_type,
                text
            ),
        });
    }
}

impl Default for NotifierLogger {
    fn default() -> Self {
        Self::current()
    }
}

/// 内存日志缓冲区，可作为 `MakeWriter` 捕获输出
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
