use std::collections::VecDeque;

use yamcs_core::model::Event;

/// Events in arrival order, prior history first. Optionally capped to the
/// most recent `window` events.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: VecDeque<Event>,
    window: Option<usize>,
}

impl EventLog {
    pub fn new(prior: impl IntoIterator<Item = Event>, window: Option<usize>) -> Self {
        let mut log = Self {
            events: VecDeque::new(),
            window,
        };
        for event in prior {
            log.push(event);
        }
        log
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
        if let Some(window) = self.window {
            while self.events.len() > window {
                self.events.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use yamcs_core::model::EventSeverity;

    fn event(seq: i64) -> Event {
        let at = Utc.timestamp_opt(1_700_000_000 + seq, 0).unwrap();
        Event {
            source: "ASTRA".into(),
            generation_time: at,
            reception_time: at,
            seq_number: seq,
            event_type: None,
            message: format!("event {seq}"),
            severity: EventSeverity::Info,
        }
    }

    fn seqs(log: &EventLog) -> Vec<i64> {
        log.snapshot().iter().map(|e| e.seq_number).collect()
    }

    #[test]
    fn appends_after_prior() {
        let mut log = EventLog::new(vec![event(1)], None);
        log.push(event(2));
        log.push(event(3));
        assert_eq!(seqs(&log), vec![1, 2, 3]);
    }

    #[test]
    fn window_keeps_most_recent() {
        let mut log = EventLog::new(vec![event(1), event(2), event(3)], Some(2));
        assert_eq!(seqs(&log), vec![2, 3]);
        log.push(event(4));
        assert_eq!(seqs(&log), vec![3, 4]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn zero_window_keeps_nothing() {
        let mut log = EventLog::new(Vec::new(), Some(0));
        log.push(event(1));
        assert!(log.is_empty());
    }
}
