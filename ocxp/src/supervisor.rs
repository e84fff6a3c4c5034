//! Arbitrates between handler heartbeats, daemon-fatal errors, the
//! idle timer and external termination.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use ocxp_common::error::Error;

#[derive(Debug)]
pub enum Event {
    /// A handler finished its payload; defers the idle timeout.
    Heartbeat,
    AcceptError(Error),
    PublishError(Error),
}

/// Runs until a terminal event: idle-timer expiry, channel closure or
/// the shutdown future are a graceful exit; accept or publish errors
/// are fatal. Each heartbeat restarts the idle timer.
pub async fn supervise(
    mut events: mpsc::Receiver<Event>,
    idle_timeout: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(Event::Heartbeat) => trace!("heartbeat, idle timer restarted"),
                Some(Event::AcceptError(e)) => {
                    error!("accept loop failed: {}", e);
                    return Err(e);
                }
                Some(Event::PublishError(e)) => {
                    error!("publish failed, shutting down: {}", e);
                    return Err(e);
                }
                None => {
                    debug!("event channel closed");
                    return Ok(());
                }
            },
            _ = sleep(idle_timeout) => {
                info!("idle for {:?}, shutting down", idle_timeout);
                return Ok(());
            }
            _ = &mut shutdown => {
                info!("termination signal received, shutting down");
                return Ok(());
            }
        }
    }
}
