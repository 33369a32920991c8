//! Panic Stack
//!
//! Process-wide LIFO of unresolved critical alerts. The state visible to
//! consumers is always the current top of stack, or "none" when empty. A
//! panic leaves the stack only through an explicit resolve referencing its
//! id, and only while it is the top.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{PanicRecord, ProducerKey};

pub struct PanicStack {
    stack: Vec<PanicRecord>,
    next_id: u64,
}

impl Default for PanicStack {
    fn default() -> Self {
        Self::new()
    }
}

impl PanicStack {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            next_id: 1,
        }
    }

    /// Push a new unresolved panic; returns the record now on top
    pub fn push(
        &mut self,
        source: ProducerKey,
        text: impl Into<String>,
        when: DateTime<Utc>,
    ) -> &PanicRecord {
        let record = PanicRecord {
            id: self.next_id,
            source,
            text: text.into(),
            depth: self.stack.len() + 1,
            when,
        };
        self.next_id += 1;

        debug!(id = record.id, depth = record.depth, "panic pushed");
        self.stack.push(record);
        // just pushed, the stack cannot be empty
        &self.stack[self.stack.len() - 1]
    }

    /// Pop the referenced panic if it is the current top. Resolving anything
    /// else is a no-op.
    pub fn resolve(&mut self, id: u64) -> bool {
        match self.stack.last() {
            Some(top) if top.id == id => {
                self.stack.pop();
                debug!(id, remaining = self.stack.len(), "panic resolved");
                true
            }
            _ => {
                debug!(id, "ignored resolve for non-top panic");
                false
            }
        }
    }

    pub fn top(&self) -> Option<&PanicRecord> {
        self.stack.last()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn when() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_000).unwrap()
    }

    fn key() -> ProducerKey {
        ProducerKey::new("monitor", "1")
    }

    #[test]
    fn test_lifo_resolution() {
        let mut stack = PanicStack::new();
        let p1 = stack.push(key(), "first", when()).id;
        let p2 = stack.push(key(), "second", when()).id;
        let p3 = stack.push(key(), "third", when()).id;

        assert_eq!(stack.top().map(|p| p.id), Some(p3));
        assert!(stack.resolve(p3));
        assert_eq!(stack.top().map(|p| p.id), Some(p2));

        // Not the top: no-op
        assert!(!stack.resolve(p1));
        assert_eq!(stack.len(), 2);

        assert!(stack.resolve(p2));
        assert!(stack.resolve(p1));
        assert!(stack.is_empty());
        assert!(stack.top().is_none());
    }

    #[test]
    fn test_depth_and_monotonic_ids() {
        let mut stack = PanicStack::new();
        let first = stack.push(key(), "first", when()).id;
        assert_eq!(stack.top().unwrap().depth, 1);

        stack.push(key(), "second", when());
        assert_eq!(stack.top().unwrap().depth, 2);

        stack.resolve(stack.top().unwrap().id);
        stack.resolve(first);

        // Ids are never reused after a pop
        let next = stack.push(key(), "third", when()).id;
        assert!(next > first + 1);
        assert_eq!(stack.top().unwrap().depth, 1);
    }

    #[test]
    fn test_resolve_on_empty_stack() {
        let mut stack = PanicStack::new();
        assert!(!stack.resolve(1));
    }
}
