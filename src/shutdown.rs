//! # Shutdown Signal
//!
//! Cooperative cancellation shared by the settle delay, the preflight check
//! and the capture loop. The channel carries `true` once the operator asked
//! to stop.

use tokio::sync::watch;
use tracing::{error, info};

/// Resolve once `cancel` reads `true` or its sender is gone
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Spawn a Ctrl+C listener and return the receiving end of its channel
///
/// Must be called from inside a tokio runtime.
pub fn ctrl_c_channel() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                let _ = cancel_tx.send(true);
            }
            Err(e) => {
                error!("Could not listen for Ctrl+C: {}", e);
                // Holding the sender keeps the session running
                std::future::pending::<()>().await;
            }
        }
    });

    cancel_rx
}
