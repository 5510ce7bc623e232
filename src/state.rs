use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::observability::MetricsRecorder;

/// Shared application state, held by both listeners.
pub struct AppState {
    pub settings: Settings,
    pub recorder: Arc<MetricsRecorder>,
    pub shutdown_tx: broadcast::Sender<()>,
    shutting_down: AtomicBool,
}

impl AppState {
    pub fn new(settings: Settings, recorder: Arc<MetricsRecorder>) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);

        Arc::new(Self {
            settings,
            recorder,
            shutdown_tx,
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been triggered.
    ///
    /// Subscribes before checking the flag so a trigger racing with the
    /// call is never missed.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + use<> {
        let mut rx = self.subscribe_shutdown();
        let already = self.is_shutting_down();
        async move {
            if !already {
                let _ = rx.recv().await;
            }
        }
    }
}
