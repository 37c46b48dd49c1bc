//! CSV ingestion — talk table and content table readers.
//!
//! Talk input: a headered CSV with columns `article`, `thread`, `username`,
//! `timestamp`, `contribution_id`, `text`. Rows are deduplicated on
//! `(article, thread, username, timestamp)` (first occurrence wins) and
//! grouped into conversations keyed by `(article, thread)`.
//!
//! Content input: a headerless CSV where column 0 is the document id and
//! column 2 is the document text. Rows without a talk conversation are
//! skipped; duplicate document ids keep the last row.
//!
//! Either input path may be a single `.csv` file or a directory of `.csv`
//! shards; shards are read in sorted path order and share one dedup set.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::CorpairError;
use crate::model::{ConversationKey, Conversations, Message, normalize_whitespace};

/// Columns the talk table must carry, in any order.
const TALK_COLUMNS: [&str; 6] = [
    "article",
    "thread",
    "username",
    "timestamp",
    "contribution_id",
    "text",
];

/// One raw row of the talk table.
#[derive(Debug, Deserialize)]
struct TalkRow {
    article: String,
    thread: String,
    username: String,
    timestamp: String,
    contribution_id: String,
    text: String,
}

/// Reference documents keyed by document id.
pub type ContentMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Talk table
// ---------------------------------------------------------------------------

/// Read the talk table from `path` (file or shard directory) into grouped,
/// deduplicated conversations.
///
/// Messages within each conversation are in encounter order; callers sort
/// them with [`crate::model::sort_conversation`] before resolution.
pub fn read_talk(path: &Path) -> anyhow::Result<Conversations> {
    let shards = csv_shards(path)?;
    let mut conversations = Conversations::new();
    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();

    for shard in &shards {
        read_talk_shard(shard, &mut conversations, &mut seen)
            .with_context(|| format!("failed to read talk table {}", shard.display()))?;
    }

    debug!(
        shards = shards.len(),
        conversations = conversations.len(),
        messages = conversations.values().map(Vec::len).sum::<usize>(),
        "talk ingestion complete"
    );
    Ok(conversations)
}

fn read_talk_shard(
    path: &Path,
    conversations: &mut Conversations,
    seen: &mut HashSet<(String, String, String, String)>,
) -> anyhow::Result<()> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| CorpairError::MalformedRecord {
            path: path.to_path_buf(),
            line: 1,
            detail: e.to_string(),
        })?;

    let headers = reader
        .headers()
        .map(Clone::clone)
        .map_err(|e| CorpairError::MalformedRecord {
            path: path.to_path_buf(),
            line: 1,
            detail: e.to_string(),
        })?;
    for column in TALK_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(CorpairError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            }
            .into());
        }
    }

    for record in reader.records() {
        let record = record.map_err(|e| malformed(path, e.position(), e.to_string()))?;
        let line = record.position().map_or(0, |p| p.line());
        let row: TalkRow = record
            .deserialize(Some(&headers))
            .map_err(|e| malformed(path, record.position(), e.to_string()))?;

        let sequence_number: i64 =
            row.contribution_id
                .trim()
                .parse()
                .map_err(|_| CorpairError::InvalidSequenceNumber {
                    path: path.to_path_buf(),
                    line,
                    value: row.contribution_id.clone(),
                })?;

        // First occurrence wins; later duplicates are dropped.
        let dedup_key = (
            row.article.clone(),
            row.thread.clone(),
            row.username.clone(),
            row.timestamp.clone(),
        );
        if !seen.insert(dedup_key) {
            trace!(line, article = %row.article, "duplicate contribution dropped");
            continue;
        }

        let key = ConversationKey::new(row.article, row.thread);
        conversations.entry(key).or_default().push(Message::from_raw(
            sequence_number,
            row.timestamp,
            row.username,
            &row.text,
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Content table
// ---------------------------------------------------------------------------

/// Read the content table from `path` (file or shard directory), keeping
/// only documents that appear in `talk_document_ids`.
pub fn read_content(
    path: &Path,
    talk_document_ids: &BTreeSet<String>,
) -> anyhow::Result<ContentMap> {
    let shards = csv_shards(path)?;
    let mut content = ContentMap::new();

    for shard in &shards {
        read_content_shard(shard, talk_document_ids, &mut content)
            .with_context(|| format!("failed to read content table {}", shard.display()))?;
    }

    debug!(
        shards = shards.len(),
        documents = content.len(),
        "content ingestion complete"
    );
    Ok(content)
}

fn read_content_shard(
    path: &Path,
    talk_document_ids: &BTreeSet<String>,
    content: &mut ContentMap,
) -> anyhow::Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CorpairError::MalformedRecord {
            path: path.to_path_buf(),
            line: 1,
            detail: e.to_string(),
        })?;

    for record in reader.records() {
        let record = record.map_err(|e| malformed(path, e.position(), e.to_string()))?;
        let document_id = record
            .get(0)
            .ok_or_else(|| malformed(path, record.position(), "missing document id column".into()))?;
        if !talk_document_ids.contains(document_id) {
            continue;
        }
        let text = record
            .get(2)
            .ok_or_else(|| malformed(path, record.position(), "missing text column".into()))?;
        // Last occurrence wins for duplicate document ids.
        content.insert(document_id.to_string(), normalize_whitespace(text));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Shard discovery
// ---------------------------------------------------------------------------

/// Resolve an input path to the list of CSV shards behind it.
///
/// A file path is its own single shard. A directory is walked for `.csv`
/// files, returned in sorted path order so dedup and last-wins semantics
/// are stable across runs.
fn csv_shards(path: &Path) -> Result<Vec<PathBuf>, CorpairError> {
    if !path.exists() {
        return Err(CorpairError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut shards: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .map(|entry| entry.into_path())
        .collect();
    shards.sort();

    if shards.is_empty() {
        return Err(CorpairError::NoInputShards {
            path: path.to_path_buf(),
        });
    }
    Ok(shards)
}

fn malformed(path: &Path, position: Option<&csv::Position>, detail: String) -> CorpairError {
    CorpairError::MalformedRecord {
        path: path.to_path_buf(),
        line: position.map_or(0, csv::Position::line),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TALK_HEADER: &str = "article,thread,username,timestamp,contribution_id,text\n";

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path)
            .unwrap_or_else(|e| panic!("create {}: {e}", path.display()));
        file.write_all(contents.as_bytes())
            .unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
        path
    }

    #[test]
    fn talk_rows_group_by_article_and_thread() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "talk.csv",
            &format!(
                "{TALK_HEADER}\
                 Physics,Merge proposal,alice,2004-01-01,10,let's merge\n\
                 Physics,Merge proposal,bob,2004-01-02,11,: agreed\n\
                 Physics,Naming,carol,2004-01-03,12,rename this\n\
                 Biology,Merge proposal,dave,2004-01-04,13,different page\n"
            ),
        );

        let conversations = read_talk(&path).unwrap();
        assert_eq!(conversations.len(), 3);
        let key = ConversationKey::new("Physics", "Merge proposal");
        let thread = &conversations[&key];
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[1].quote_depth, 1);
        assert_eq!(thread[1].sequence_number, 11);
    }

    #[test]
    fn duplicate_contributions_keep_first_occurrence() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "talk.csv",
            &format!(
                "{TALK_HEADER}\
                 Physics,Naming,alice,2004-01-01,10,original text\n\
                 Physics,Naming,alice,2004-01-01,99,re-ingested duplicate\n"
            ),
        );

        let conversations = read_talk(&path).unwrap();
        let key = ConversationKey::new("Physics", "Naming");
        assert_eq!(conversations[&key].len(), 1);
        assert_eq!(conversations[&key][0].text, "original text");
        assert_eq!(conversations[&key][0].sequence_number, 10);
    }

    #[test]
    fn non_integer_contribution_id_is_a_hard_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "talk.csv",
            &format!("{TALK_HEADER}Physics,Naming,alice,2004-01-01,not-a-number,text\n"),
        );

        let err = read_talk(&path).unwrap_err();
        let err = err
            .downcast_ref::<CorpairError>()
            .unwrap_or_else(|| panic!("expected CorpairError, got {err:#}"));
        assert!(matches!(err, CorpairError::InvalidSequenceNumber { .. }));
    }

    #[test]
    fn missing_talk_column_is_reported_by_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "talk.csv",
            "article,thread,username,timestamp,text\nPhysics,Naming,alice,2004-01-01,text\n",
        );

        let err = read_talk(&path).unwrap_err();
        let err = err
            .downcast_ref::<CorpairError>()
            .unwrap_or_else(|| panic!("expected CorpairError, got {err:#}"));
        match err {
            CorpairError::MissingColumn { column, .. } => {
                assert_eq!(column, "contribution_id");
            }
            other => panic!("expected MissingColumn, got {other}"),
        }
    }

    #[test]
    fn talk_directory_shards_share_one_dedup_set() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "a.csv",
            &format!("{TALK_HEADER}Physics,Naming,alice,2004-01-01,10,first shard\n"),
        );
        write_file(
            tmp.path(),
            "b.csv",
            &format!(
                "{TALK_HEADER}\
                 Physics,Naming,alice,2004-01-01,11,duplicate of first shard\n\
                 Physics,Naming,bob,2004-01-02,12,new in second shard\n"
            ),
        );

        let conversations = read_talk(tmp.path()).unwrap();
        let key = ConversationKey::new("Physics", "Naming");
        assert_eq!(conversations[&key].len(), 2);
        assert_eq!(conversations[&key][0].text, "first shard");
    }

    #[test]
    fn missing_input_path_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = read_talk(&tmp.path().join("absent.csv")).unwrap_err();
        let err = err
            .downcast_ref::<CorpairError>()
            .unwrap_or_else(|| panic!("expected CorpairError, got {err:#}"));
        assert!(matches!(err, CorpairError::InputNotFound { .. }));
    }

    #[test]
    fn empty_shard_directory_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = read_talk(tmp.path()).unwrap_err();
        let err = err
            .downcast_ref::<CorpairError>()
            .unwrap_or_else(|| panic!("expected CorpairError, got {err:#}"));
        assert!(matches!(err, CorpairError::NoInputShards { .. }));
    }

    #[test]
    fn content_skips_documents_without_talk_and_keeps_last_duplicate() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "content.csv",
            "Physics,rev-1,Physics   article body\n\
             Orphan,rev-2,no talk page for this one\n\
             Physics,rev-3,updated physics body\n",
        );
        let talk_ids: BTreeSet<String> = ["Physics".to_string()].into();

        let content = read_content(&path, &talk_ids).unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content["Physics"], "updated physics body");
    }

    #[test]
    fn content_normalizes_whitespace() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "content.csv",
            "Physics,rev-1,\"spread   over\n\nlines\"\n",
        );
        let talk_ids: BTreeSet<String> = ["Physics".to_string()].into();

        let content = read_content(&path, &talk_ids).unwrap();
        assert_eq!(content["Physics"], "spread over lines");
    }

    #[test]
    fn content_row_without_text_column_is_a_hard_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(tmp.path(), "content.csv", "Physics,rev-1\n");
        let talk_ids: BTreeSet<String> = ["Physics".to_string()].into();

        let err = read_content(&path, &talk_ids).unwrap_err();
        let err = err
            .downcast_ref::<CorpairError>()
            .unwrap_or_else(|| panic!("expected CorpairError, got {err:#}"));
        assert!(matches!(err, CorpairError::MalformedRecord { .. }));
    }
}
