//! Broadcast transport for emitted point clouds.
//!
//! Every emission is encoded once and pushed into a bounded broadcast
//! channel. The channel keeps the last `history_depth` messages; a subscriber
//! that falls further behind skips ahead instead of slowing playback down.

use axum::body::Bytes;
use log::trace;
use std::sync::Arc;
use tokio::sync::broadcast;

use lidar_replay_core::{DeliveryError, PointCloudMessage};

use crate::scheduler::FrameSink;

#[derive(Debug, Clone)]
pub struct CloudPublisher {
    topic: String,
    tx: broadcast::Sender<Bytes>,
    output: bool,
}

impl CloudPublisher {
    /// `history_depth` must be at least 1
    pub fn new(topic: &str, history_depth: usize, output: bool) -> Self {
        let (tx, _) = broadcast::channel(history_depth.max(1));
        Self {
            topic: topic.to_string(),
            tx,
            output,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl FrameSink<PointCloudMessage> for CloudPublisher {
    fn deliver(&self, cloud: &Arc<PointCloudMessage>, timestamp_ns: i64) -> Result<(), DeliveryError> {
        if self.output {
            println!(
                "{} stamp={}.{:09} points={}",
                self.topic,
                cloud.header.stamp.sec,
                cloud.header.stamp.nanosec,
                cloud.point_count()
            );
        }
        if self.tx.receiver_count() == 0 {
            trace!("No subscribers on {}, frame at {} not sent", self.topic, timestamp_ns);
            return Ok(());
        }

        let bytes = Bytes::from(cloud.encode()?);
        // Subscribers may leave between the count above and the send
        if self.tx.send(bytes).is_err() {
            trace!("No subscribers on {}", self.topic);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidar_replay_core::point::PointXyzi;
    use tokio::sync::broadcast::error::TryRecvError;

    fn cloud(timestamp_ns: i64) -> Arc<PointCloudMessage> {
        let points = [PointXyzi::new(1.0, 2.0, 3.0, 0.25)];
        Arc::new(PointCloudMessage::from_points(&points, timestamp_ns, "pointcloud"))
    }

    #[test]
    fn test_deliver_without_subscribers() {
        let publisher = CloudPublisher::new("pointcloud", 2, false);
        assert_eq!(publisher.subscriber_count(), 0);
        assert!(publisher.deliver(&cloud(1), 1).is_ok());
    }

    #[test]
    fn test_subscriber_receives_decodable_cloud() {
        let publisher = CloudPublisher::new("pointcloud", 2, false);
        let mut rx = publisher.subscribe();

        publisher.deliver(&cloud(1_500_000_000), 1_500_000_000).unwrap();

        let bytes = rx.try_recv().unwrap();
        let decoded = PointCloudMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.header.stamp.sec, 1);
        assert_eq!(decoded.header.stamp.nanosec, 500_000_000);
        assert_eq!(decoded.point_count(), 1);
    }

    #[test]
    fn test_slow_subscriber_keeps_latest_history() {
        let publisher = CloudPublisher::new("pointcloud", 2, false);
        let mut rx = publisher.subscribe();

        for t in 1..=5 {
            publisher.deliver(&cloud(t), t).unwrap();
        }

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(3))));
        let stamps: Vec<u32> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|b| PointCloudMessage::decode(&b).unwrap().header.stamp.nanosec)
            .collect();
        assert_eq!(stamps, vec![4, 5]);
    }
}
