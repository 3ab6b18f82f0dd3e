//! Reconciliation of partial command-history updates.

use crate::model::{CommandAssignment, CommandAttribute, CommandHistoryEntry};

/// Merge a partial update into the entry already known for the same id.
///
/// Attributes and assignments are keyed by name: `incoming` wins per name,
/// the position of a name is where it first appeared. Scalar fields take
/// `incoming`'s value, optional ones fall back to `current` when `incoming`
/// leaves them unset. Assignments stay `None` only if both sides lack them.
pub fn merge_command_entries(
    current: &CommandHistoryEntry,
    incoming: &CommandHistoryEntry,
) -> CommandHistoryEntry {
    let attr = merge_by_name(&current.attr, &incoming.attr, |a: &CommandAttribute| &a.name);

    let assignments = match (&current.assignments, &incoming.assignments) {
        (None, None) => None,
        (cur, inc) => Some(merge_by_name(
            cur.as_deref().unwrap_or_default(),
            inc.as_deref().unwrap_or_default(),
            |a: &CommandAssignment| &a.name,
        )),
    };

    CommandHistoryEntry {
        id: incoming.id.clone(),
        command_name: incoming.command_name.clone(),
        aliases: incoming.aliases.clone().or_else(|| current.aliases.clone()),
        origin: incoming.origin.clone(),
        sequence_number: incoming.sequence_number.or(current.sequence_number),
        command_id: incoming
            .command_id
            .clone()
            .or_else(|| current.command_id.clone()),
        attr,
        generation_time: incoming.generation_time,
        assignments,
    }
}

/// Order entries by generation time, newest first. Ties keep their order.
pub fn sort_newest_first(entries: &mut [CommandHistoryEntry]) {
    entries.sort_by(|a, b| b.generation_time.cmp(&a.generation_time));
}

fn merge_by_name<T, F>(current: &[T], incoming: &[T], name: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &String,
{
    let mut merged: Vec<T> = Vec::with_capacity(current.len() + incoming.len());
    for item in current.iter().chain(incoming) {
        match merged.iter_mut().find(|m| name(m) == name(item)) {
            Some(slot) => *slot = item.clone(),
            None => merged.push(item.clone()),
        }
    }
    merged
}
