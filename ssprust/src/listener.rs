//! Periodic poll loop
//!
//! Runs while the validator is enabled. Each tick sleeps for the poll
//! interval, then polls the device and dispatches what it reports. A failed
//! poll stops the loop and closes the connection.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::device::Device;

/// Handle to a running poll loop
pub(crate) struct Listener {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Listener {
    /// `generation` identifies this loop; a newer listener or a stop
    /// request makes it stale
    pub(crate) fn spawn(device: Device, interval: Duration, generation: u64) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(?interval, generation, "Poll listener started");

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stopped.changed() => {
                        debug!("Poll listener stopping");
                        break;
                    }
                }

                if !device.listener_active(generation) {
                    break;
                }

                if let Err(e) = device.poll().await {
                    if !device.listener_active(generation) {
                        debug!(error = %e, "Poll failed after the listener was stopped");
                        break;
                    }
                    error!(error = %e, "Poll failed, closing connection");
                    device.close_after_poll_failure(generation).await;
                    break;
                }
            }

            info!("Poll listener stopped");
        });

        Self { stop, handle }
    }

    /// Ask the loop to stop; an in-flight poll is allowed to finish
    pub(crate) fn stop(self) {
        let _ = self.stop.send(true);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
