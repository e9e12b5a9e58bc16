use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use tutor_pairing::workflows::pairing::{Notification, Notifier, NotifyError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notifier that records every message in the structured log instead of
/// delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            template = notification.template.label(),
            recipient = %notification.recipient,
            details = ?notification.details,
            "notification dispatched"
        );
        Ok(())
    }
}
