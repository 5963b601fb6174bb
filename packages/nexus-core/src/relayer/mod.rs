use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use log::{info, error, warn};
use crate::{
    config::RelayerConfig,
    nexus::{MessageRegistry, Router},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub routed: usize,
    pub pending: usize,
    pub failed: usize,
}

/// 中继器：重试分发时未能立即路由的消息。
/// 重试次数保存在消息注册表中，多次独立运行会累计
pub struct Relayer {
    config: RelayerConfig,
    messages: Arc<dyn MessageRegistry>,
    router: Arc<dyn Router>,
}

impl Relayer {
    pub fn new(config: RelayerConfig, messages: Arc<dyn MessageRegistry>, router: Arc<dyn Router>) -> Self {
        Self {
            config,
            messages,
            router,
        }
    }

    pub async fn start<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Starting relayer...");
        tokio::pin!(shutdown);

        loop {
            let report = self.relay_pending().await;
            if report != RelayReport::default() {
                info!(
                    "Relay pass finished: {} routed, {} pending, {} failed",
                    report.routed, report.pending, report.failed
                );
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Relayer stopped");
                    return;
                }
                _ = sleep(Duration::from_secs(self.config.poll_interval)) => {}
            }
        }
    }

    /// 对所有 Approved 状态的消息重试一次路由
    pub async fn relay_pending(&self) -> RelayReport {
        let mut report = RelayReport::default();

        for message in self.messages.approved_messages() {
            let e = match self.router.route_message(&message.id, &[]) {
                Ok(()) => {
                    info!("Successfully routed message {} to {}", message.id, message.recipient.chain.name);
                    report.routed += 1;
                    continue;
                }
                Err(e) => e,
            };

            let count = match self.messages.record_route_attempt(&message.id) {
                Ok(count) => count,
                Err(record_err) => {
                    error!("Failed to record route attempt for message {}: {}", message.id, record_err);
                    report.pending += 1;
                    continue;
                }
            };

            if count < self.config.max_retries {
                warn!(
                    "Retry {}/{} for message {} failed: {}",
                    count, self.config.max_retries, message.id, e
                );
                report.pending += 1;
                continue;
            }

            error!(
                "Max retries ({}) reached for message {}. Last error: {}",
                self.config.max_retries, message.id, e
            );
            match self.messages.set_message_failed(&message.id) {
                Ok(()) => report.failed += 1,
                Err(e) => {
                    error!("Failed to mark message {} as failed: {}", message.id, e);
                    report.pending += 1;
                }
            }
        }

        report
    }
}
