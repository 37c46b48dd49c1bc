//! Conversation model — the IR (intermediate representation) for corpair.
//!
//! Raw talk-table rows are parsed into these types at ingestion, and both
//! output tables are generated from them. Text normalization and quote-depth
//! derivation live here because every downstream decision (parent inference
//! included) reads the normalized form, never the raw one.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reserved sentinel carried in the timestamp column that forces a message
/// to be treated as its conversation's root.
pub const THREAD_STARTER: &str = "THREAD_STARTER";

/// Separator between document id and thread title in a serialized key.
const SEQ_ID_SEPARATOR: &str = "###";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

static QUOTE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:*").expect("invalid quote-run regex"));

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Identity of one conversation: a (document id, thread title) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Document the talk page belongs to.
    pub document_id: String,
    /// Section/thread title within that talk page.
    pub thread_title: String,
}

impl ConversationKey {
    pub fn new(document_id: impl Into<String>, thread_title: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            thread_title: thread_title.into(),
        }
    }

    /// Serialized key used in the thread table's `SeqId` column:
    /// `<document_id>###<thread_title>`.
    pub fn seq_id(&self) -> String {
        format!(
            "{}{}{}",
            self.document_id, SEQ_ID_SEPARATOR, self.thread_title
        )
    }

    /// Parse a serialized `SeqId` back into a key. Splits on the first
    /// separator occurrence; returns `None` if the separator is absent.
    pub fn from_seq_id(seq_id: &str) -> Option<Self> {
        let (document_id, thread_title) = seq_id.split_once(SEQ_ID_SEPARATOR)?;
        Some(Self::new(document_id, thread_title))
    }
}

/// A single talk-page contribution after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Strictly increasing id assigned upstream, reflecting contribution
    /// order. Not necessarily gap-free or conversation-local.
    pub sequence_number: i64,
    /// Opaque sort key. May carry the [`THREAD_STARTER`] sentinel instead of
    /// an actual date; never interpreted as a point in time.
    pub timestamp: String,
    /// Contributor identifier.
    pub author: String,
    /// Whitespace-normalized body.
    pub text: String,
    /// Length of the leading `:` run in `text` — a structural proxy for how
    /// deeply nested the reply is.
    pub quote_depth: usize,
    /// Whether this message is flagged as its conversation's root.
    pub thread_starter: bool,
}

impl Message {
    /// Build a message from raw row fields, normalizing the body and
    /// deriving quote depth and the starter flag.
    pub fn from_raw(
        sequence_number: i64,
        timestamp: impl Into<String>,
        author: impl Into<String>,
        raw_text: &str,
    ) -> Self {
        let timestamp = timestamp.into();
        let text = normalize_whitespace(raw_text);
        let quote_depth = leading_quote_depth(&text);
        let thread_starter = timestamp == THREAD_STARTER;
        Self {
            sequence_number,
            timestamp,
            author: author.into(),
            text,
            quote_depth,
            thread_starter,
        }
    }

    /// Sort key establishing the total order within a conversation.
    fn sort_key(&self) -> (i64, &str, &str) {
        (self.sequence_number, &self.timestamp, &self.author)
    }
}

/// All conversations keyed and ordered by [`ConversationKey`].
pub type Conversations = BTreeMap<ConversationKey, Vec<Message>>;

// ---------------------------------------------------------------------------
// Derivations
// ---------------------------------------------------------------------------

/// Collapse every run of whitespace to a single space.
///
/// Deliberately does NOT trim: a leading blank survives as one space, which
/// masks any quote markers behind it and therefore yields depth 0. The depth
/// heuristic depends on this.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").into_owned()
}

/// Count the leading run of `:` characters in normalized text.
pub fn leading_quote_depth(text: &str) -> usize {
    QUOTE_RUN
        .find(text)
        .map(|m| m.as_str().len())
        .unwrap_or(0)
}

/// Sort a conversation into its canonical order:
/// ascending `(sequence_number, timestamp, author)`.
///
/// Must run exactly once, before parent resolution.
pub fn sort_conversation(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
