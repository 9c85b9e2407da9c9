//! Graceful shutdown.
//!
//! On SIGINT or SIGTERM the server stops accepting new completions and
//! `axum::serve(..).with_graceful_shutdown()` drains the ones in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Resolves on the first OS termination signal, after clearing `accepting`.
pub async fn shutdown_signal(accepting: Arc<AtomicBool>) {
    let signal = wait_for_signal().await;
    accepting.store(false, Ordering::SeqCst);
    tracing::info!(signal, "shutdown requested, draining in-flight completions");
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    {
        tokio::select! {
            () = ctrl_c => "SIGINT",
            () = terminate => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        "SIGINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn shutdown_signal_is_send_future() {
        fn assert_send_future<T: std::future::Future<Output = ()> + Send>(_f: T) {}
        assert_send_future(shutdown_signal(Arc::new(AtomicBool::new(true))));
    }

    #[tokio::test]
    async fn accepting_stays_set_without_signal() {
        let accepting = Arc::new(AtomicBool::new(true));
        let outcome = tokio::select! {
            () = shutdown_signal(accepting.clone()) => "shutdown",
            _ = tokio::time::sleep(Duration::from_millis(10)) => "timeout",
        };
        assert_eq!(outcome, "timeout");
        assert!(accepting.load(Ordering::SeqCst));
    }
}
