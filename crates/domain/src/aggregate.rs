//! Core aggregate and domain event traits.

use common::InstanceId;
use history::Sequence;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for events stored in an instance history.
///
/// Events record facts that already happened; they are immutable and named
/// in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// Trait for state rebuilt by folding a history of events.
///
/// `apply` must be pure and deterministic: the same state and event always
/// produce the same new state, with no side effects and no failure path.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The events this aggregate consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the instance identifier, or None before the first event.
    fn id(&self) -> Option<InstanceId>;

    /// Returns the sequence of the last applied event.
    fn sequence(&self) -> Sequence;

    /// Records the sequence of the last applied event.
    fn set_sequence(&mut self, sequence: Sequence);

    /// Applies an event, updating state.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in order.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Started,
        Bumped { by: i32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Started => "CounterStarted",
                CounterEvent::Bumped { .. } => "CounterBumped",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        id: Option<InstanceId>,
        total: i32,
        sequence: Sequence,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<InstanceId> {
            self.id
        }

        fn sequence(&self) -> Sequence {
            self.sequence
        }

        fn set_sequence(&mut self, sequence: Sequence) {
            self.sequence = sequence;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Started => self.id = Some(InstanceId::new()),
                CounterEvent::Bumped { by } => self.total += by,
            }
            self.sequence = self.sequence.next();
        }
    }

    #[test]
    fn apply_events_folds_in_order() {
        let mut counter = Counter::default();
        counter.apply_events(vec![
            CounterEvent::Started,
            CounterEvent::Bumped { by: 2 },
            CounterEvent::Bumped { by: 5 },
        ]);

        assert!(counter.id().is_some());
        assert_eq!(counter.total, 7);
        assert_eq!(counter.sequence(), Sequence::new(3));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(CounterEvent::Started.event_type(), "CounterStarted");
        assert_eq!(CounterEvent::Bumped { by: 1 }.event_type(), "CounterBumped");
    }
}
