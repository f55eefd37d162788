//! Playback subsystem: waits for the synchronization point, then runs the
//! scheduler until shutdown is requested.

use log::{debug, info};
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tokio_graceful_shutdown::SubsystemHandle;

use lidar_replay_core::{FrameSequence, PointCloudMessage};

use crate::config;
use crate::publisher::CloudPublisher;
use crate::scheduler::{PlaybackConfig, PlaybackScheduler};
use crate::{ReplayError, Session};

pub struct Playback {
    session: Session,
    sequence: Arc<FrameSequence<PointCloudMessage>>,
    publisher: CloudPublisher,
    config: PlaybackConfig,
    start_at: Instant,
}

impl Playback {
    /// `process_start` is the reference for the configured sync delay
    pub fn new(
        session: Session,
        sequence: Arc<FrameSequence<PointCloudMessage>>,
        process_start: Instant,
    ) -> Self {
        let args = session.args();
        let publisher = session.publisher();
        Self {
            session,
            sequence,
            publisher,
            config: PlaybackConfig::with_boundary_wait(config::boundary_wait(&args)),
            start_at: process_start + config::sync_delay(&args),
        }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ReplayError> {
        if self.start_at > Instant::now() {
            debug!(
                "Waiting {:?} for the synchronization point",
                self.start_at.saturating_duration_since(Instant::now())
            );
            tokio::select! { biased;
                _ = subsys.on_shutdown_requested() => {
                    info!("Shutdown before playback started");
                    return Ok(());
                },
                _ = sleep_until(self.start_at) => {}
            }
        }

        let mut scheduler = PlaybackScheduler::new(self.config);
        scheduler.start(self.sequence, self.publisher)?;
        self.session.set_playback(scheduler.handle());

        subsys.on_shutdown_requested().await;

        scheduler.stop();
        scheduler.join().await;
        info!(
            "Playback stopped after {} frames",
            scheduler.status().emissions
        );
        Ok(())
    }
}
