//! Path Stack - history of visited blocks
//!
//! The top of the stack is the block currently awaiting input. Entries are only
//! ever appended, except through an explicit [`PathStack::pop`].

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a block in the flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BlockId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BlockId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&BlockId> for BlockId {
    fn from(value: &BlockId) -> Self {
        value.clone()
    }
}

impl PartialEq<str> for BlockId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BlockId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Ordered history of visited block ids.
///
/// A stack is always created with its initial block, so `current()` is
/// defined for the whole lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStack {
    entries: Vec<BlockId>,
}

impl PathStack {
    pub fn new(initial: impl Into<BlockId>) -> Self {
        Self {
            entries: vec![initial.into()],
        }
    }

    pub fn push(&mut self, id: impl Into<BlockId>) {
        self.entries.push(id.into());
    }

    /// Remove the top entry. The initial entry is never removed.
    pub fn pop(&mut self) -> Option<BlockId> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop()
    }

    pub fn current(&self) -> Option<&BlockId> {
        self.entries.last()
    }

    pub fn previous(&self) -> Option<&BlockId> {
        self.entries.len().checked_sub(2).map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false` for a constructed stack; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockId> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_and_previous() {
        let mut stack = PathStack::new("start");
        assert_eq!(stack.current(), Some(&BlockId::from("start")));
        assert_eq!(stack.previous(), None);

        stack.push("ask_name");
        stack.push("greet");
        assert_eq!(stack.current().map(BlockId::as_str), Some("greet"));
        assert_eq!(stack.previous().map(BlockId::as_str), Some("ask_name"));
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_pop_keeps_initial_entry() {
        let mut stack = PathStack::new("start");
        stack.push("next");

        assert_eq!(stack.pop(), Some(BlockId::from("next")));
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.len(), 1);
        assert!(!stack.is_empty());
    }

    #[test]
    fn test_same_block_may_repeat() {
        let mut stack = PathStack::new("loop");
        stack.push("loop");
        stack.push("loop");
        let ids: Vec<&str> = stack.iter().map(BlockId::as_str).collect();
        assert_eq!(ids, vec!["loop", "loop", "loop"]);
    }

    #[test]
    fn test_blank_id_is_empty() {
        assert!(BlockId::from("  ").is_empty());
        assert!(!BlockId::from("end").is_empty());
    }
}
