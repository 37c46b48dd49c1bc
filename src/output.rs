//! Output serialization — the two aligned corpus tables and the stats report.
//!
//! Column order is part of the contract with downstream trainers:
//!
//! - thread table: `SeqId,InstNo,Author,Parent,Domain,Text`
//! - content table: `DocId,Text`
//!
//! Both tables carry a header row. The caller supplies conversations and
//! documents already joined and ordered; this module only renders them.

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::CorpairError;
use crate::ingest::ContentMap;
use crate::resolver::{ParentIndex, ResolvedThread};

/// Join/coverage counters surfaced in the stats report and the CLI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStats {
    /// Document ids present on both sides of the join.
    pub common_documents: usize,
    /// Documents with content but no talk conversation. Structurally zero
    /// with the current ingestion (content rows without talk are skipped);
    /// reported anyway for continuity of the stats format.
    pub content_only_documents: usize,
    /// Document ids that have conversations but no reference document.
    pub talk_only_documents: Vec<String>,
    /// Conversations ingested, before the join.
    pub total_conversations: usize,
    /// Conversations that survived the join and were emitted.
    pub included_conversations: usize,
    /// Messages written to the thread table.
    pub messages_written: usize,
}

/// Wire form of a parent index: `-1` for a root, the position otherwise.
fn parent_field(parent: ParentIndex) -> String {
    parent.map_or(-1, |j| j as i64).to_string()
}

/// Write the thread table. `threads` must already be join-filtered and in
/// emission order.
pub fn write_thread_table(path: &Path, threads: &[ResolvedThread]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| write_error(path, &e))?;

    writer
        .write_record(["SeqId", "InstNo", "Author", "Parent", "Domain", "Text"])
        .map_err(|e| write_error(path, &e))?;

    let mut rows = 0usize;
    for thread in threads {
        let seq_id = thread.key.seq_id();
        for (position, (message, parent)) in
            thread.messages.iter().zip(&thread.parents).enumerate()
        {
            let position_field = position.to_string();
            let parent = parent_field(*parent);
            writer
                .write_record([
                    seq_id.as_str(),
                    position_field.as_str(),
                    message.author.as_str(),
                    parent.as_str(),
                    thread.key.document_id.as_str(),
                    message.text.as_str(),
                ])
                .map_err(|e| write_error(path, &e))?;
            rows += 1;
        }
    }

    writer.flush().map_err(|e| write_error(path, &e))?;
    debug!(path = %path.display(), threads = threads.len(), rows, "thread table written");
    Ok(())
}

/// Write the content table for the given document ids, in the map's sorted
/// key order.
pub fn write_content_table(path: &Path, content: &ContentMap) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| write_error(path, &e))?;

    writer
        .write_record(["DocId", "Text"])
        .map_err(|e| write_error(path, &e))?;
    for (document_id, text) in content {
        writer
            .write_record([document_id.as_str(), text.as_str()])
            .map_err(|e| write_error(path, &e))?;
    }

    writer.flush().map_err(|e| write_error(path, &e))?;
    debug!(path = %path.display(), documents = content.len(), "content table written");
    Ok(())
}

/// Write the human-readable stats report.
///
/// The report is a pure function of `stats`, so re-running a build over the
/// same inputs reproduces it byte for byte.
pub fn write_stats(path: &Path, stats: &CorpusStats) -> anyhow::Result<()> {
    let mut report = String::new();
    let _ = writeln!(report, "Common articles: {}", stats.common_documents);
    let _ = writeln!(report, " - Content only: {}", stats.content_only_documents);
    let _ = writeln!(report, " - Talk only: {}", stats.talk_only_documents.len());
    for document_id in &stats.talk_only_documents {
        let _ = writeln!(report, "{document_id}");
    }
    let _ = writeln!(report, "Total num of threads: {}", stats.total_conversations);
    let _ = writeln!(
        report,
        "Num of threads included: {}",
        stats.included_conversations
    );

    std::fs::write(path, report).map_err(|e| write_error(path, &e))?;
    debug!(path = %path.display(), "stats report written");
    Ok(())
}

fn write_error(path: &Path, error: &dyn std::fmt::Display) -> CorpairError {
    CorpairError::OutputWriteError {
        path: path.to_path_buf(),
        detail: error.to_string(),
    }
}
