//! Periodic outbound dispatch: once per scheduler tick, drain the bus's
//! outbound queue and hand each message to its channel's `send`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use halyard_bus::Bus;
use halyard_channels::ChannelManager;

pub async fn run(
    bus: Arc<Bus>,
    manager: Arc<ChannelManager>,
    tick_secs: u64,
    shutdown: CancellationToken,
) {
    info!(tick_secs, "outbound dispatcher starting");
    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("outbound dispatcher stopping");
                return;
            }
            _ = interval.tick() => {
                let sent = halyard_channels::dispatch_outbound(&bus, &manager).await;
                if sent > 0 {
                    debug!(sent, "dispatched outbound messages");
                }
            }
        }
    }
}
