//! End-to-end corpus build: ingest → join → resolve → emit.
//!
//! Conversations are independent of one another, so parent resolution runs
//! in parallel with rayon. All output ordering comes from sorted map keys,
//! never from task completion order, so parallelism cannot perturb the
//! emitted tables.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CorpairError;
use crate::ingest;
use crate::output::{self, CorpusStats};
use crate::resolver::ResolvedThread;

/// Explicit source and destination locations for one corpus build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Talk table: a CSV file or a directory of CSV shards.
    pub talk_path: PathBuf,
    /// Content table: a CSV file or a directory of CSV shards.
    pub content_path: PathBuf,
    /// Directory the three outputs are written into (created if absent).
    pub out_dir: PathBuf,
    /// Thread table filename within `out_dir`.
    pub thread_table_name: String,
    /// Content table filename within `out_dir`.
    pub content_table_name: String,
    /// Stats report filename within `out_dir`.
    pub stats_name: String,
}

impl BuildOptions {
    pub fn new(
        talk_path: impl Into<PathBuf>,
        content_path: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            talk_path: talk_path.into(),
            content_path: content_path.into(),
            out_dir: out_dir.into(),
            thread_table_name: "talk.csv".to_string(),
            content_table_name: "content.csv".to_string(),
            stats_name: "stats.txt".to_string(),
        }
    }
}

/// What a build produced, for CLI and JSON display.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub stats: CorpusStats,
    pub thread_table: PathBuf,
    pub content_table: PathBuf,
    pub stats_report: PathBuf,
}

/// Run the full pipeline described by `options`.
pub fn build(options: &BuildOptions) -> anyhow::Result<BuildReport> {
    info!(
        talk = %options.talk_path.display(),
        content = %options.content_path.display(),
        out = %options.out_dir.display(),
        "starting corpus build"
    );

    let conversations = ingest::read_talk(&options.talk_path)?;
    let talk_ids: BTreeSet<String> = conversations
        .keys()
        .map(|key| key.document_id.clone())
        .collect();
    let content = ingest::read_content(&options.content_path, &talk_ids)?;
    let content_ids: BTreeSet<String> = content.keys().cloned().collect();
    let common: BTreeSet<String> = talk_ids.intersection(&content_ids).cloned().collect();

    debug!(
        talk_documents = talk_ids.len(),
        content_documents = content_ids.len(),
        common_documents = common.len(),
        "join computed"
    );

    let total_conversations = conversations.len();

    // Join: only conversations with a reference document are emitted.
    // BTreeMap iteration gives the deterministic (document id, thread title)
    // emission order; into_par_iter preserves it through collection.
    let joined: Vec<_> = conversations
        .into_iter()
        .filter(|(key, _)| common.contains(&key.document_id))
        .collect();
    let included_conversations = joined.len();

    let threads: Vec<ResolvedThread> = joined
        .into_par_iter()
        .map(|(key, messages)| ResolvedThread::resolve(key, messages))
        .collect();
    let messages_written = threads.iter().map(|t| t.messages.len()).sum();

    let stats = CorpusStats {
        common_documents: common.len(),
        content_only_documents: content_ids.difference(&talk_ids).count(),
        talk_only_documents: talk_ids.difference(&content_ids).cloned().collect(),
        total_conversations,
        included_conversations,
        messages_written,
    };

    create_out_dir(&options.out_dir)?;
    let thread_table = options.out_dir.join(&options.thread_table_name);
    let content_table = options.out_dir.join(&options.content_table_name);
    let stats_report = options.out_dir.join(&options.stats_name);

    output::write_thread_table(&thread_table, &threads)?;
    output::write_content_table(&content_table, &content)?;
    output::write_stats(&stats_report, &stats)?;

    info!(
        conversations = included_conversations,
        messages = messages_written,
        "corpus build complete"
    );

    Ok(BuildReport {
        stats,
        thread_table,
        content_table,
        stats_report,
    })
}

fn create_out_dir(path: &Path) -> Result<(), CorpairError> {
    std::fs::create_dir_all(path).map_err(|e| CorpairError::OutputWriteError {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
