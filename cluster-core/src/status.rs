//! Thread-safe sink for progress events (C7)

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

/// One progress update (spec.md §3's `Status event` / §6's schema).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Host label, possibly decorated `"hostname/engine"`.
    pub host: String,
    pub file: String,
    /// `"<num>x"` or `"---"`.
    pub speed: String,
    /// `"<int>%"`.
    pub comp: String,
    pub completed: u8,
    pub status: Option<String>,
}

impl StatusEvent {
    pub fn new(host: impl Into<String>, file: impl Into<String>, completed: u8) -> Self {
        Self {
            host: host.into(),
            file: file.into(),
            speed: "---".to_string(),
            comp: "0%".to_string(),
            completed,
            status: None,
        }
    }

    pub fn with_speed(mut self, speed: impl Into<String>) -> Self {
        self.speed = speed.into();
        self
    }

    pub fn with_comp(mut self, comp: impl Into<String>) -> Self {
        self.comp = comp.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// An unbounded multi-producer single/multi-consumer sink, cloneable across
/// worker tasks. `recv` blocks with a 2 s timeout so a renderer can poll
/// scheduler liveness without spinning (spec.md §5).
#[derive(Clone)]
pub struct StatusBus {
    tx: Sender<StatusEvent>,
    rx: Receiver<StatusEvent>,
}

impl StatusBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<StatusEvent> {
        self.tx.clone()
    }

    pub fn publish(&self, event: StatusEvent) {
        // An unbounded channel only fails to send if every receiver has been
        // dropped, which only happens after the bus itself is gone.
        let _ = self.tx.send(event);
    }

    /// Blocks up to 2 s for the next event; `None` on timeout.
    pub fn recv_timeout(&self) -> Option<StatusEvent> {
        match self.rx.recv_timeout(Duration::from_secs(2)) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_and_receives_events_in_order() {
        let bus = StatusBus::new();
        bus.publish(StatusEvent::new("ws", "a.mkv", 10));
        bus.publish(StatusEvent::new("ws", "a.mkv", 20));

        let first = bus.recv_timeout().unwrap();
        let second = bus.recv_timeout().unwrap();
        assert_eq!(first.completed, 10);
        assert_eq!(second.completed, 20);
    }

    #[test]
    fn recv_timeout_returns_none_when_empty() {
        let bus = StatusBus::new();
        assert!(bus.recv_timeout().is_none());
    }

    #[test]
    fn builder_methods_set_optional_fields() {
        let event = StatusEvent::new("ws/default", "a.mkv", 100)
            .with_speed("1.2x")
            .with_comp("40%")
            .with_status("1430mb -> 858mb");
        assert_eq!(event.speed, "1.2x");
        assert_eq!(event.comp, "40%");
        assert_eq!(event.status.as_deref(), Some("1430mb -> 858mb"));
    }
}
