use tokio::signal;

/// Resolves on Ctrl+C, or SIGTERM on unix, letting axum drain in-flight
/// requests.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            crate::error::log_error(&e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                crate::error::log_error(&e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            #[cfg(not(windows))]
            println!();
            tracing::info!("Ctrl+C received, draining connections.");
        }
        _ = terminate => tracing::info!("SIGTERM received, draining connections."),
    }
}
