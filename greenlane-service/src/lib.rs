#![allow(clippy::module_name_repetitions)]

use anyhow::{Context, Result};
use tokio::sync::watch;

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod telemetry;

#[cfg(test)]
mod tests;

/// Spawns a task that will automatically trigger shutdown if it encounters an error
///
/// # Arguments
///
/// * `f` - The future to execute, which must return a `Result<()>`
/// * `shutdown_sender` - A channel sender used to signal shutdown to other parts of the application
///
/// # Returns
///
/// Returns a `JoinHandle` for the spawned task
pub fn spawn_with_shutdown<F>(
    f: F,
    shutdown_sender: watch::Sender<bool>,
) -> tokio::task::JoinHandle<Result<()>>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::task::spawn(async move {
        let res = f.await;
        if res.is_err() {
            // Only send shutdown signal if the task failed
            shutdown_sender
                .send(true)
                .context("Failed to send shutdown signal")?;
        }
        res
    })
}
