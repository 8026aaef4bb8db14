//! 通知器内部诊断与指标。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-notifier counters.
#[derive(Debug)]
pub struct NotifierDiagnostics {
    /// 创建时间
    start_time: Instant,

    /// 已处理的消息数
    messages_received: AtomicU64,

    /// 已执行的语句数
    statements_executed: AtomicU64,

    /// 提交次数
    commits: AtomicU64,

    /// 驱动返回的错误数
    errors: AtomicU64,
}

/// 诊断数据的快照，用于外部查询。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub uptime: Duration,
    pub messages_received: u64,
    pub statements_executed: u64,
    pub commits: u64,
    pub errors: u64,
}

impl Default for NotifierDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifierDiagnostics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            messages_received: AtomicU64::new(0),
            statements_executed: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn increment_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_statements_executed(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            uptime: self.start_time.elapsed(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for DiagnosticsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "uptime={:.3}s messages={} statements={} commits={} errors={}",
            self.uptime.as_secs_f64(),
            self.messages_received,
            self.statements_executed,
            self.commits,
            self.errors
        )
    }
}
