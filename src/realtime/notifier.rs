//! Hand-off point between committed race events and the real-time transport.
//!
//! Every subscriber owns an unbounded queue, so a slow reader falls behind
//! but never misses an event. The socket layer subscribes per race and
//! forwards what it receives; it is not part of this crate.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::models::event::RaceEvent;

pub type RaceEvents = mpsc::UnboundedReceiver<RaceEvent>;

#[derive(Debug, Default)]
pub struct RaceNotifier {
    channels: DashMap<Uuid, Vec<mpsc::UnboundedSender<RaceEvent>>>,
}

impl RaceNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never blocks. Returns how many subscribers the event reached; zero
    /// subscribers is not an error. Dropped receivers are pruned here.
    pub fn publish(&self, event: RaceEvent) -> usize {
        let Some(mut subscribers) = self.channels.get_mut(&event.race_id) else {
            trace!(channel = %event.channel(), event = event.name(), "race event had no subscribers");
            return 0;
        };
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        let delivered = subscribers.len();
        trace!(channel = %event.channel(), event = event.name(), delivered, "race event published");
        delivered
    }

    pub fn subscribe(&self, race_id: Uuid) -> RaceEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.entry(race_id).or_default().push(tx);
        rx
    }

    pub fn subscriber_count(&self, race_id: Uuid) -> usize {
        self.channels
            .get(&race_id)
            .map(|subscribers| subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop the channel; open receivers get `None` once drained.
    pub fn close(&self, race_id: Uuid) {
        if let Some((_, subscribers)) = self.channels.remove(&race_id) {
            debug!(%race_id, subscribers = subscribers.len(), "race channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::RaceEventKind;
    use chrono::Utc;

    fn joined(race_id: Uuid, revision: u64, user: &str) -> RaceEvent {
        RaceEvent {
            race_id,
            revision,
            occurred_at: Utc::now(),
            kind: RaceEventKind::ParticipantJoined {
                user_id: user.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn subscribers_only_see_their_race() {
        let notifier = RaceNotifier::default();
        let race_a = Uuid::new_v4();
        let race_b = Uuid::new_v4();
        let mut rx_a = notifier.subscribe(race_a);
        let mut rx_b = notifier.subscribe(race_b);

        assert_eq!(notifier.publish(joined(race_a, 2, "alice")), 1);

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.revision, 2);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_still_gets_every_event() {
        let notifier = RaceNotifier::new();
        let race_id = Uuid::new_v4();
        let mut rx = notifier.subscribe(race_id);

        for revision in 1..=500 {
            assert_eq!(notifier.publish(joined(race_id, revision, "dave")), 1);
        }

        for revision in 1..=500 {
            assert_eq!(rx.recv().await.unwrap().revision, revision);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let notifier = RaceNotifier::new();
        let race_id = Uuid::new_v4();
        let _kept = notifier.subscribe(race_id);
        drop(notifier.subscribe(race_id));

        assert_eq!(notifier.subscriber_count(race_id), 1);
        assert_eq!(notifier.publish(joined(race_id, 2, "erin")), 1);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let notifier = RaceNotifier::default();
        assert_eq!(notifier.publish(joined(Uuid::new_v4(), 2, "bob")), 0);
    }

    #[tokio::test]
    async fn close_ends_the_stream() {
        let notifier = RaceNotifier::new();
        let race_id = Uuid::new_v4();
        let mut rx = notifier.subscribe(race_id);
        notifier.publish(joined(race_id, 2, "carol"));
        notifier.close(race_id);

        assert_eq!(rx.recv().await.map(|e| e.revision), Some(2));
        assert!(rx.recv().await.is_none());
        assert_eq!(notifier.subscriber_count(race_id), 0);
    }
}
