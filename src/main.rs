#![forbid(unsafe_code)]

//! corpair — aligned corpus pair builder.
//!
//! CLI entry point: parses arguments, dispatches subcommands, renders output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use corpair::model::ConversationKey;
use corpair::pipeline::{self, BuildOptions};
use corpair::resolver::ResolvedThread;

/// Build aligned talk-thread and reference-document corpora.
///
/// Reconstructs reply-to parents for flat talk-page contributions, joins
/// them with reference documents, and emits CSV tables ready for
/// topic-model training.
#[derive(Parser, Debug)]
#[command(
    name = "corpair",
    version = long_version(),
    about,
    long_about = None,
)]
struct Cli {
    /// Show detailed pipeline progress.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show everything including per-record parsing details.
    #[arg(long, global = true)]
    trace: bool,

    /// Output as JSON for machine consumption.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write both corpus tables plus a stats report.
    Build {
        /// Talk table: a CSV file or a directory of CSV shards.
        #[arg(long)]
        talk: PathBuf,

        /// Content table: a CSV file or a directory of CSV shards.
        #[arg(long)]
        content: PathBuf,

        /// Output directory (created if absent).
        #[arg(long)]
        out: PathBuf,

        /// Thread table filename within the output directory.
        #[arg(long, default_value = "talk.csv")]
        talk_out: String,

        /// Content table filename within the output directory.
        #[arg(long, default_value = "content.csv")]
        content_out: String,

        /// Stats report filename within the output directory.
        #[arg(long, default_value = "stats.txt")]
        stats_out: String,
    },

    /// Resolve conversations and print their inferred structure without
    /// writing any corpus files.
    Inspect {
        /// Talk table: a CSV file or a directory of CSV shards.
        #[arg(long)]
        talk: PathBuf,

        /// Only show the conversation with this SeqId
        /// (`<document-id>###<thread-title>`).
        #[arg(long)]
        key: Option<String>,

        /// Maximum conversations to show.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for (bash, zsh, fish).
        shell: String,
    },
}

/// Build the long version string with embedded build metadata.
///
/// vergen-gix always emits these env vars (uses placeholders when values are
/// unavailable), so `env!()` is safe here.
fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("VERGEN_GIT_SHA"),
        " ",
        env!("VERGEN_BUILD_TIMESTAMP"),
        " ",
        env!("VERGEN_CARGO_TARGET_TRIPLE"),
        ")",
    )
}

/// Initialize the tracing subscriber based on CLI flags.
///
/// Priority: `--trace` > `--verbose` > `RUST_LOG` env var > default (warn).
fn init_tracing(cli: &Cli) {
    let filter = if cli.trace {
        EnvFilter::new("corpair=trace")
    } else if cli.verbose {
        EnvFilter::new("corpair=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Command::Build {
            talk,
            content,
            out,
            talk_out,
            content_out,
            stats_out,
        } => cmd_build(
            talk,
            content,
            out,
            talk_out,
            content_out,
            stats_out,
            cli.json,
        ),
        Command::Inspect { talk, key, limit } => {
            cmd_inspect(talk, key.as_deref(), *limit, cli.json)
        }
        Command::Completions { shell } => cmd_completions(shell),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                let json = serde_json::json!({
                    "ok": false,
                    "error_type": error_type_name(&e),
                    "message": format!("{e}"),
                });
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            } else {
                eprintln!("{} {e}", "Error:".red().bold());
            }
            ExitCode::FAILURE
        }
    }
}

/// Extract a short error type name for JSON output.
fn error_type_name(e: &anyhow::Error) -> &'static str {
    use corpair::error::CorpairError;
    if let Some(err) = e.downcast_ref::<CorpairError>() {
        match err {
            CorpairError::InputNotFound { .. } => "InputNotFound",
            CorpairError::NoInputShards { .. } => "NoInputShards",
            CorpairError::MalformedRecord { .. } => "MalformedRecord",
            CorpairError::MissingColumn { .. } => "MissingColumn",
            CorpairError::InvalidSequenceNumber { .. } => "InvalidSequenceNumber",
            CorpairError::OutputWriteError { .. } => "OutputWriteError",
        }
    } else {
        "InternalError"
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_build(
    talk: &Path,
    content: &Path,
    out: &Path,
    talk_out: &str,
    content_out: &str,
    stats_out: &str,
    json_mode: bool,
) -> anyhow::Result<()> {
    let mut options = BuildOptions::new(talk, content, out);
    options.thread_table_name = talk_out.to_string();
    options.content_table_name = content_out.to_string();
    options.stats_name = stats_out.to_string();

    let report = pipeline::build(&options)?;

    if json_mode {
        let json = serde_json::json!({
            "ok": true,
            "stats": report.stats,
            "thread_table": report.thread_table,
            "content_table": report.content_table,
            "stats_report": report.stats_report,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!(
            "{} Built aligned corpora for {} documents",
            "✓".green().bold(),
            report.stats.common_documents.to_string().cyan()
        );
        println!(
            "  {} → {} conversations, {} messages",
            "Threads".dimmed(),
            report.stats.included_conversations,
            report.stats.messages_written
        );
        println!("  {} → {}", "Written".dimmed(), report.thread_table.display());
        println!("  {} → {}", "Written".dimmed(), report.content_table.display());
        println!("  {} → {}", "Written".dimmed(), report.stats_report.display());
        if !report.stats.talk_only_documents.is_empty() {
            println!(
                "  {} {} conversations dropped (no reference document)",
                "⚠".yellow(),
                report.stats.total_conversations - report.stats.included_conversations
            );
        }
    }

    Ok(())
}

fn cmd_inspect(
    talk: &Path,
    key_filter: Option<&str>,
    limit: usize,
    json_mode: bool,
) -> anyhow::Result<()> {
    let conversations = corpair::ingest::read_talk(talk)?;

    let wanted: Option<ConversationKey> = match key_filter {
        Some(raw) => Some(ConversationKey::from_seq_id(raw).ok_or_else(|| {
            anyhow::anyhow!("Invalid key '{raw}'. Expected '<document-id>###<thread-title>'.")
        })?),
        None => None,
    };

    let threads: Vec<ResolvedThread> = conversations
        .into_iter()
        .filter(|(key, _)| wanted.as_ref().is_none_or(|w| w == key))
        .take(limit)
        .map(|(key, messages)| ResolvedThread::resolve(key, messages))
        .collect();

    if let Some(w) = &wanted
        && threads.is_empty()
    {
        anyhow::bail!(
            "No conversation found for key '{}'. Run 'corpair inspect --talk …' without --key to list conversations.",
            w.seq_id()
        );
    }

    if json_mode {
        let json: Vec<serde_json::Value> = threads
            .iter()
            .map(|t| {
                serde_json::json!({
                    "seq_id": t.key.seq_id(),
                    "document_id": t.key.document_id,
                    "thread_title": t.key.thread_title,
                    "messages": t
                        .messages
                        .iter()
                        .zip(&t.parents)
                        .enumerate()
                        .map(|(position, (m, parent))| {
                            serde_json::json!({
                                "position": position,
                                "parent": parent.map_or(-1, |j| j as i64),
                                "author": m.author,
                                "quote_depth": m.quote_depth,
                                "thread_starter": m.thread_starter,
                            })
                        })
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        if threads.is_empty() {
            println!("No conversations found.");
            return Ok(());
        }
        for thread in &threads {
            println!(
                "{} ({} messages)",
                thread.key.seq_id().bold(),
                thread.messages.len()
            );
            for (position, (message, parent)) in
                thread.messages.iter().zip(&thread.parents).enumerate()
            {
                let parent_label = match parent {
                    Some(j) => format!("→ {j}"),
                    None => "root".to_string(),
                };
                println!(
                    "  {:>3} {} {} {}",
                    position.to_string().cyan(),
                    format!("[{parent_label}]").dimmed(),
                    format!("depth {}", message.quote_depth).dimmed(),
                    message.author
                );
            }
            println!();
        }
    }

    Ok(())
}

fn cmd_completions(shell: &str) -> anyhow::Result<()> {
    use clap::CommandFactory;
    use clap_complete::{Shell, generate};

    let parsed_shell: Shell = shell
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown shell '{shell}'. Use: bash, zsh, fish"))?;

    let mut cmd = Cli::command();
    generate(parsed_shell, &mut cmd, "corpair", &mut std::io::stdout());

    Ok(())
}
