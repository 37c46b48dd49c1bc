//! Thread parent inference from arrival order and quote depth.
//!
//! A conversation arrives as a flat, sorted list of messages with no
//! explicit reply-to links. This module infers a parent for every message
//! using only two structural signals: position in the sorted order and the
//! leading-quote depth of the body.
//!
//! ## Algorithm overview
//!
//! Messages are processed strictly in sorted order. The first message (or
//! any message flagged as a thread starter) becomes the current root. Every
//! other message scans backward from its immediate predecessor and attaches
//! to the first earlier message that is structurally compatible:
//!
//! - the current root (always eligible, so the scan always terminates), or
//! - an unquoted predecessor, when this message is itself unquoted, or
//! - a predecessor quoted strictly shallower, when this message is quoted.
//!
//! The clauses carry no priority among themselves: the nearest matching
//! position wins regardless of which clause matched. An unquoted message
//! therefore attaches to a nearer unquoted sibling even when the root is
//! also eligible further back.

use crate::model::{ConversationKey, Message, sort_conversation};

/// Inferred parent for one message position. `None` marks a thread root;
/// `Some(j)` points at a strictly earlier position in the same conversation.
pub type ParentIndex = Option<usize>;

/// One conversation after sorting and parent resolution: messages in
/// canonical order, with a parallel parent array.
#[derive(Debug, Clone)]
pub struct ResolvedThread {
    pub key: ConversationKey,
    pub messages: Vec<Message>,
    pub parents: Vec<ParentIndex>,
}

impl ResolvedThread {
    /// Sort one conversation into canonical order and infer its parents.
    pub fn resolve(key: ConversationKey, mut messages: Vec<Message>) -> Self {
        sort_conversation(&mut messages);
        let parents = resolve_parents(&messages);
        Self {
            key,
            messages,
            parents,
        }
    }
}

/// Infer a parent for every message of one conversation.
///
/// `messages` must already be in canonical order (see
/// [`crate::model::sort_conversation`]) and non-empty in practice; an empty
/// slice yields an empty result.
///
/// The returned vector has one entry per input position. Entry `i` is
/// `None` (root) or `Some(j)` with `j < i`.
///
/// # Panics
///
/// Panics if the backward scan finds no eligible parent for a non-root
/// message. This is unreachable when the input is processed as specified:
/// a root exists from position 0 onward and is always an eligible
/// candidate, so reaching the panic means the scan itself is broken.
pub fn resolve_parents(messages: &[Message]) -> Vec<ParentIndex> {
    let mut parents: Vec<ParentIndex> = Vec::with_capacity(messages.len());
    // Append-only log of quote depths for positions already processed.
    let mut depths: Vec<usize> = Vec::with_capacity(messages.len());
    let mut thread_root: Option<usize> = None;

    for (index, message) in messages.iter().enumerate() {
        if index == 0 || message.thread_starter {
            parents.push(None);
            thread_root = Some(index);
        } else {
            let parent = (0..index).rfind(|&candidate| {
                Some(candidate) == thread_root
                    || (message.quote_depth == 0 && depths[candidate] == 0)
                    || (message.quote_depth > 0 && depths[candidate] < message.quote_depth)
            });
            match parent {
                Some(candidate) => parents.push(Some(candidate)),
                None => unreachable!(
                    "no eligible parent at position {index}: the root fallback must match"
                ),
            }
        }
        depths.push(message.quote_depth);
    }

    parents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, THREAD_STARTER};

    /// Build a message whose only meaningful signal is its quote depth.
    fn at_depth(sequence_number: i64, depth: usize) -> Message {
        let body = format!("{}body", ":".repeat(depth));
        Message::from_raw(sequence_number, "2004-01-01T00:00:00Z", "tester", &body)
    }

    /// Render parents in the wire form (-1 for root) for terse assertions.
    fn as_wire(parents: &[ParentIndex]) -> Vec<i64> {
        parents
            .iter()
            .map(|p| p.map_or(-1, |j| j as i64))
            .collect()
    }

    #[test]
    fn single_message_is_root() {
        let conv = vec![at_depth(1, 0)];
        assert_eq!(as_wire(&resolve_parents(&conv)), [-1]);
    }

    #[test]
    fn empty_conversation_yields_empty_parents() {
        assert!(resolve_parents(&[]).is_empty());
    }

    #[test]
    fn strictly_increasing_depth_forms_a_chain() {
        let conv = vec![at_depth(1, 0), at_depth(2, 1), at_depth(3, 2), at_depth(4, 3)];
        assert_eq!(as_wire(&resolve_parents(&conv)), [-1, 0, 1, 2]);
    }

    #[test]
    fn unquoted_message_attaches_to_nearest_unquoted_sibling() {
        // Message 3 is unquoted; scanning back, position 2 is quoted so no
        // clause matches there, and the equal-depth clause matches at
        // position 1 — the nearer unquoted sibling wins over the (also
        // eligible) root at position 0.
        let mut conv = vec![at_depth(1, 0), at_depth(2, 0), at_depth(3, 1), at_depth(4, 0)];
        conv[0].thread_starter = true;
        assert_eq!(as_wire(&resolve_parents(&conv)), [-1, 0, 1, 1]);
    }

    #[test]
    fn quoted_reply_attaches_to_nearest_strictly_shallower() {
        // depth 2 at position 3 skips its depth-2 predecessor and lands on
        // the depth-1 message at position 1.
        let conv = vec![at_depth(1, 0), at_depth(2, 1), at_depth(3, 2), at_depth(4, 2)];
        assert_eq!(as_wire(&resolve_parents(&conv)), [-1, 0, 1, 1]);
    }

    #[test]
    fn deep_jump_falls_back_to_root_when_nothing_shallower_intervenes() {
        // Position 2 is quoted but every predecessor except the root is
        // deeper; the root clause is what catches it.
        let conv = vec![at_depth(1, 0), at_depth(2, 5), at_depth(3, 3)];
        // Scan for position 2: candidate 1 has depth 5 (not < 3), candidate 0
        // is the root.
        assert_eq!(as_wire(&resolve_parents(&conv)), [-1, 0, 0]);
    }

    #[test]
    fn starter_flag_resets_the_root_mid_conversation() {
        let mut conv = vec![at_depth(1, 0), at_depth(2, 1), at_depth(3, 0), at_depth(4, 4)];
        conv[2].timestamp = THREAD_STARTER.to_string();
        conv[2].thread_starter = true;
        let parents = as_wire(&resolve_parents(&conv));
        // Position 2 restarts the thread; position 3's scan matches the new
        // root immediately at its nearest candidate.
        assert_eq!(parents, [-1, 0, -1, 2]);
    }

    #[test]
    fn quoted_message_ignores_equal_depth_predecessors() {
        let conv = vec![at_depth(1, 0), at_depth(2, 2), at_depth(3, 2)];
        // Candidate 1 has equal depth (no match); candidate 0 matches both
        // the shallower clause and the root clause.
        assert_eq!(as_wire(&resolve_parents(&conv)), [-1, 0, 0]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let conv: Vec<Message> = (0..40).map(|i| at_depth(i, (i as usize) % 5)).collect();
        let first = resolve_parents(&conv);
        let second = resolve_parents(&conv);
        assert_eq!(first, second);
    }

    #[test]
    fn every_parent_precedes_its_child() {
        let conv: Vec<Message> = (0..60)
            .map(|i| at_depth(i, ((i * 7) % 4) as usize))
            .collect();
        let parents = resolve_parents(&conv);
        assert_eq!(parents[0], None);
        for (index, parent) in parents.iter().enumerate().skip(1) {
            let j = parent.unwrap_or_else(|| panic!("position {index} has no parent"));
            assert!(j < index, "parent {j} does not precede child {index}");
        }
    }

    #[test]
    fn text_content_beyond_depth_does_not_affect_resolution() {
        let mut a = vec![at_depth(1, 0), at_depth(2, 1), at_depth(3, 0)];
        let mut b = a.clone();
        a[2].text = "completely different words".to_string();
        b[2].text = "other phrasing entirely".to_string();
        assert_eq!(resolve_parents(&a), resolve_parents(&b));
    }
}
