//! 通知器运行任务
//!
//! Hosts one notifier on tokio. Every notifier call is blocking, so each one
//! runs on the blocking pool and the notifier box is handed back afterwards.
//! Messages are delivered one at a time in channel order.

use crate::error::{NotifierError, Result};
use crate::message::Message;
use crate::notifier::NotifierDyn;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages handed to the notifier.
    pub delivered: u64,
    /// Messages outside the subscription set.
    pub skipped: u64,
    /// Notifier stats taken after finalize.
    pub stats: String,
}

/// 启动通知器任务
///
/// Initializes the notifier, then delivers messages from `receiver` until the
/// channel closes, `shutdown` fires or a handler fails. `finalize` always
/// runs once `initialize` succeeded. A handler error takes precedence over a
/// finalize error.
pub fn spawn_notifier(
    notifier: Box<dyn NotifierDyn>,
    receiver: mpsc::Receiver<Message>,
    shutdown: broadcast::Receiver<()>,
) -> JoinHandle<Result<RunSummary>> {
    tokio::spawn(run_notifier(notifier, receiver, shutdown))
}

async fn run_notifier(
    notifier: Box<dyn NotifierDyn>,
    mut receiver: mpsc::Receiver<Message>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<RunSummary> {
    let type_name = notifier.type_name_dyn();
    let (mut notifier, initialized) = run_blocking(notifier, |n| n.initialize_dyn()).await?;
    initialized?;

    let subscribed = notifier.subscribed_message_types_dyn();
    info!(notifier = type_name, "通知器任务已启动");

    let mut summary = RunSummary::default();
    let mut failure = None;

    loop {
        tokio::select! {
            message = receiver.recv() => {
                match message {
                    Some(message) if subscribed.contains(&message.message_type()) => {
                        let (returned, result) =
                            run_blocking(notifier, move |n| n.receive_message_dyn(&message)).await?;
                        notifier = returned;

                        match result {
                            Ok(()) => summary.delivered += 1,
                            Err(e) => {
                                error!(notifier = type_name, error = %e, "消息处理失败");
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                    Some(message) => {
                        debug!(
                            notifier = type_name,
                            message_type = %message.message_type(),
                            "跳过未订阅的消息"
                        );
                        summary.skipped += 1;
                    }
                    None => {
                        debug!(notifier = type_name, "消息通道已关闭");
                        break;
                    }
                }
            },

            _ = shutdown.recv() => {
                info!(notifier = type_name, "收到停机信号");
                break;
            }
        }
    }

    let (notifier, finalized) = run_blocking(notifier, |n| n.finalize_dyn()).await?;
    summary.stats = notifier.stats_dyn();
    info!(notifier = type_name, stats = %summary.stats, "通知器任务已停止");

    match (failure, finalized) {
        (Some(e), Ok(())) => Err(e),
        (Some(e), Err(finalize_error)) => {
            warn!(error = %finalize_error, "消息处理失败后 finalize 也失败");
            Err(e)
        }
        (None, finalized) => finalized.map(|()| summary),
    }
}

/// Runs `f` against the notifier on the blocking pool and returns the
/// notifier with the call's result.
async fn run_blocking<T, F>(
    mut notifier: Box<dyn NotifierDyn>,
    f: F,
) -> Result<(Box<dyn NotifierDyn>, Result<T>)>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn NotifierDyn) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = f(notifier.as_mut());
        (notifier, result)
    })
    .await
    .map_err(|e| NotifierError::task(format!("通知器工作线程执行失败: {}", e)))
}
