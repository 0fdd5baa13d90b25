//! Termination-signal handling for the lifecycle.
//!
//! Invocation runtimes are short-lived, so signal listening runs on its own
//! thread with its own runtime. On a signal the cleanup registry is drained
//! synchronously and the process exits. An invocation still running on
//! another thread is not driven to completion.

use super::Lifecycle;
use std::sync::Arc;
use tracing::{error, info};

/// Waits for a termination signal and returns its name.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    Ok(name)
}

/// Waits for a termination signal and returns its name.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL_C")
}

pub(super) fn install(lifecycle: Arc<Lifecycle>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("async-lambda-signals".to_string())
        .spawn(move || {
            let received = runtime.block_on(wait_for_shutdown_signal());
            // Leave the runtime first so cleanup callbacks can build their own.
            drop(runtime);

            match received {
                Ok(signal) => {
                    info!(signal, "Received signal, initiating cleanup...");
                    lifecycle.run_cleanup();
                    std::process::exit(0);
                }
                Err(e) => error!(error = %e, "Signal listener failed"),
            }
        })?;

    info!("Installed termination signal handlers");
    Ok(())
}
