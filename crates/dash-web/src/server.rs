use axum::serve;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::error::WebError;
use crate::routes::router;
use crate::state::WebState;

/// Bind and serve until ctrl-c, then tear the supervisor down: cancel every
/// live agent and await their termination latches.
pub async fn run_web_server(bind_addr: &str, state: WebState) -> Result<(), WebError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|err| WebError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    let supervisor = Arc::clone(&state.supervisor);
    serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| WebError::Internal(err.to_string()))?;

    supervisor.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => eprintln!("[web] shutdown signal received"),
        Err(err) => {
            eprintln!("[web] failed to install shutdown handler: {err}");
            std::future::pending::<()>().await;
        }
    }
}
