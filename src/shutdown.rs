use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the signal handler and the
/// tracking loop. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Triggers `token` on the first Ctrl-C.
pub fn listen_for_ctrl_c(token: ShutdownToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::warn!("Interrupted, stopping after the current step");
                token.trigger();
            }
            Err(e) => log::error!("Unable to listen for Ctrl-C: {}", e),
        }
    })
}
