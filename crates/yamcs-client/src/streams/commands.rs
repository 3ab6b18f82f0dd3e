use std::collections::HashMap;

use yamcs_core::model::CommandHistoryEntry;
use yamcs_core::{merge_command_entries, sort_newest_first};

/// Command history keyed by command id, folded from prior history and live
/// partial updates.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    entries: Vec<CommandHistoryEntry>,
    index: HashMap<String, usize>,
}

impl CommandLog {
    /// Seed from prior history. A later entry for an id replaces an earlier one.
    pub fn new(prior: impl IntoIterator<Item = CommandHistoryEntry>) -> Self {
        let mut log = Self::default();
        for entry in prior {
            match log.index.get(&entry.id) {
                Some(&slot) => log.entries[slot] = entry,
                None => log.push(entry),
            }
        }
        log
    }

    /// Merge a live update into the entry with the same id, or add it.
    pub fn apply(&mut self, incoming: CommandHistoryEntry) {
        match self.index.get(&incoming.id) {
            Some(&slot) => {
                let merged = merge_command_entries(&self.entries[slot], &incoming);
                self.entries[slot] = merged;
            }
            None => self.push(incoming),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CommandHistoryEntry> {
        self.index.get(id).map(|&slot| &self.entries[slot])
    }

    /// All entries, newest generation time first.
    pub fn snapshot(&self) -> Vec<CommandHistoryEntry> {
        let mut entries = self.entries.clone();
        sort_newest_first(&mut entries);
        entries
    }

    fn push(&mut self, entry: CommandHistoryEntry) {
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use yamcs_core::model::{CommandAttribute, Value};

    fn entry(id: &str, secs: i64, attrs: &[(&str, &str)]) -> CommandHistoryEntry {
        CommandHistoryEntry {
            id: id.into(),
            command_name: "/flight/ping".into(),
            aliases: None,
            origin: "ops".into(),
            sequence_number: None,
            command_id: None,
            attr: attrs
                .iter()
                .map(|(n, v)| CommandAttribute {
                    name: (*n).into(),
                    value: Value::Text { value: (*v).into() },
                })
                .collect(),
            generation_time: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            assignments: None,
        }
    }

    fn ids(entries: &[CommandHistoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn snapshot_is_newest_first() {
        let mut log = CommandLog::new(vec![entry("a", 1, &[]), entry("b", 3, &[])]);
        log.apply(entry("c", 2, &[]));
        assert_eq!(ids(&log.snapshot()), vec!["b", "c", "a"]);
    }

    #[test]
    fn order_does_not_depend_on_arrival() {
        let older = entry("t1", 1, &[]);
        let newer = entry("t2", 2, &[]);

        let mut log = CommandLog::new(Vec::new());
        log.apply(older.clone());
        log.apply(newer.clone());
        assert_eq!(ids(&log.snapshot()), vec!["t2", "t1"]);

        let mut log = CommandLog::new(Vec::new());
        log.apply(newer);
        log.apply(older);
        assert_eq!(ids(&log.snapshot()), vec!["t2", "t1"]);
    }

    #[test]
    fn updates_merge_into_existing_entry() {
        let mut log = CommandLog::new(vec![entry("a", 1, &[("Queued", "OK")])]);
        log.apply(entry("a", 1, &[("Sent", "OK")]));
        log.apply(entry("a", 1, &[("Queued", "NOK")]));

        assert_eq!(log.len(), 1);
        let merged = log.get("a").unwrap();
        assert_eq!(merged.attribute("Queued"), Some(&Value::Text { value: "NOK".into() }));
        assert_eq!(merged.attribute("Sent"), Some(&Value::Text { value: "OK".into() }));
    }

    #[test]
    fn duplicate_prior_entries_keep_the_later() {
        let log = CommandLog::new(vec![entry("a", 1, &[("x", "1")]), entry("a", 1, &[("y", "2")])]);
        assert_eq!(log.len(), 1);
        assert!(log.get("a").unwrap().attribute("x").is_none());
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let log = CommandLog::new(vec![entry("a", 5, &[]), entry("b", 5, &[]), entry("c", 5, &[])]);
        assert_eq!(ids(&log.snapshot()), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_log() {
        let log = CommandLog::new(Vec::new());
        assert!(log.is_empty());
        assert!(log.snapshot().is_empty());
    }
}
