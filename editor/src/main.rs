use anyhow::Context;
use clap::{Parser, ValueEnum};
use editor::actors::{SessionSweeperActor, SweepNotice, SweeperArguments};
use editor::document::{DocumentCodec, JsonCodec, PlainTextCodec};
use editor::suggestions::{
    DisabledSuggestions, Instruction, SharedSuggestionProvider, StaticSuggestionProvider,
};
use editor::{EditorConfig, SessionError, SessionStore, Strategy};
use ractor::Actor;
use shared_types::{
    Decision, LiteralRule, ReviewItem, ReviewSummary, SessionMode, SessionState, Suggestion,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const OWNER: &str = "cli";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "editor")]
#[command(about = "Review and apply find/replace or suggested edits to a document")]
#[command(version)]
struct Cli {
    /// Document to edit
    input: PathBuf,

    /// Text to find (pair each with --replace)
    #[arg(long = "find")]
    find: Vec<String>,

    /// Replacement for the matching --find
    #[arg(long = "replace")]
    replace: Vec<String>,

    /// JSON file with suggested fixes ([{"excerpt", "replacement", ...}])
    #[arg(long, conflicts_with = "find")]
    suggestions: Option<PathBuf>,

    #[arg(long)]
    case_insensitive: bool,

    #[arg(long)]
    whole_word: bool,

    /// Apply every candidate without prompting
    #[arg(long)]
    auto: bool,

    /// Document format (defaults from the file extension)
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Output path (defaults to <stem>_revised.<ext>)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// TOML config file; environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    let mut current = cwd.clone();
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            match dotenvy::from_path(&candidate) {
                Ok(_) => tracing::debug!(path = %candidate.display(), "Loaded environment from .env"),
                Err(e) => tracing::warn!(
                    path = %candidate.display(),
                    error = %e,
                    "Failed to load .env file"
                ),
            }
            return;
        }
        if !current.pop() {
            break;
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EditorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            EditorConfig::from_toml_str(&raw)?
        }
        None => {
            load_env_file();
            EditorConfig::from_env()?
        }
    };
    if cli.case_insensitive {
        config.case_sensitive = false;
    }
    if cli.whole_word {
        config.whole_word = true;
    }
    if cli.auto {
        config.mode = SessionMode::AutoApply;
    }
    Ok(config)
}

fn codec_for(cli: &Cli) -> Box<dyn DocumentCodec> {
    let format = cli.format.unwrap_or_else(|| {
        match cli.input.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Format::Json,
            _ => Format::Text,
        }
    });
    match format {
        Format::Text => Box::new(PlainTextCodec),
        Format::Json => Box::new(JsonCodec),
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{stem}_revised.{}", ext.to_string_lossy()),
        None => format!("{stem}_revised"),
    };
    input.with_file_name(name)
}

fn strategy_for(cli: &Cli) -> anyhow::Result<(Strategy, SharedSuggestionProvider)> {
    if let Some(path) = &cli.suggestions {
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read suggestions {}", path.display()))?;
        let suggestions: Vec<Suggestion> =
            serde_json::from_slice(&raw).context("Suggestions file is not a JSON list")?;
        let provider: SharedSuggestionProvider = Arc::new(StaticSuggestionProvider::new(suggestions));
        return Ok((Strategy::suggested(Instruction::Fixes), provider));
    }

    if cli.find.is_empty() {
        anyhow::bail!("Nothing to do: pass --find/--replace pairs or --suggestions");
    }
    if cli.find.len() != cli.replace.len() {
        anyhow::bail!(
            "Got {} --find but {} --replace values",
            cli.find.len(),
            cli.replace.len()
        );
    }
    let rules = cli
        .find
        .iter()
        .zip(&cli.replace)
        .map(|(search, replace)| LiteralRule::new(search.as_str(), replace.as_str()))
        .collect();
    let provider: SharedSuggestionProvider = Arc::new(DisabledSuggestions);
    Ok((
        Strategy::Literal {
            rules,
            options: None,
        },
        provider,
    ))
}

fn print_item(item: &ReviewItem) {
    let candidate = &item.candidate;
    println!();
    println!("[{}/{}] {}", item.position, item.total, item.context);
    println!("  - {}", candidate.original_text);
    println!("  + {}", candidate.proposed_text);
    if let Some(rationale) = &candidate.rationale {
        println!("  ({rationale})");
    }
}

fn print_summary(summary: &ReviewSummary) {
    println!();
    println!(
        "Applied {} of {} (rejected {}, skipped {})",
        summary.applied, summary.total, summary.rejected, summary.stale
    );
    if summary.unmapped_suggestions > 0 {
        println!(
            "{} suggestion(s) could not be located",
            summary.unmapped_suggestions
        );
    }
    for skipped in &summary.skipped {
        println!("  {} '{}': {}", skipped.id, skipped.original_text, skipped.reason.describe());
    }
    for warning in &summary.warnings {
        println!("  warning: {warning}");
    }
}

async fn prompt<R>(lines: &mut tokio::io::Lines<R>) -> anyhow::Result<Decision>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        println!("[a]ccept / [r]eject / [c]ancel?");
        let Some(line) = lines.next_line().await? else {
            return Ok(Decision::Cancel);
        };
        match line.trim().to_ascii_lowercase().as_str() {
            "a" | "accept" | "y" | "yes" => return Ok(Decision::Accept),
            "r" | "reject" | "n" | "no" => return Ok(Decision::Reject),
            "c" | "cancel" | "q" => return Ok(Decision::Cancel),
            _ => continue,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let codec = codec_for(&cli);
    let (strategy, provider) = strategy_for(&cli)?;

    let document = codec
        .load(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    tracing::info!(
        path = %cli.input.display(),
        codec = codec.name(),
        paragraphs = document.paragraphs().len(),
        "Loaded document"
    );

    let mut auto = config.mode == SessionMode::AutoApply;
    let store = SessionStore::new(config, provider);

    let (notice_tx, mut notice_rx) = tokio::sync::mpsc::unbounded_channel();
    let (sweeper, sweeper_handle) = Actor::spawn(
        Some(format!("session_sweeper:{}", ulid::Ulid::new())),
        SessionSweeperActor,
        SweeperArguments {
            store: store.clone(),
            interval: std::time::Duration::from_secs(30),
            notices: Some(notice_tx),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to start session sweeper: {e}"))?;
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            match notice {
                SweepNotice::Warning(warning) => eprintln!(
                    "No activity for {}s; the session will be cancelled soon.",
                    warning.idle_seconds
                ),
                SweepNotice::Expired(_) => eprintln!("Session expired after inactivity."),
            }
        }
    });

    let id = store.start_session(OWNER, document, None, strategy).await?;
    store.wait_until_settled(&id).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = store.state(&id).await?;
    while state == SessionState::Reviewing {
        let Some(item) = store.current_review(&id).await? else {
            break;
        };
        let decision = if auto {
            Decision::AcceptAll
        } else {
            print_item(&item);
            prompt(&mut lines).await?
        };

        state = match store.decide(&id, decision).await {
            Ok(state) => state,
            Err(SessionError::BatchHalted {
                applied,
                remaining,
                source,
            }) => {
                eprintln!("Stopped after {applied} edits ({remaining} left): {source}");
                auto = false;
                SessionState::Reviewing
            }
            Err(SessionError::Range(e)) => {
                eprintln!("Could not apply this edit: {e}");
                SessionState::Reviewing
            }
            Err(e) => return Err(e.into()),
        };
    }

    let outcome = if state == SessionState::Completed {
        let summary = store.summary(&id).await?;
        let document = store.get_result(&id).await?;
        let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.input));
        codec
            .save(&document, &output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        print_summary(&summary);
        println!("Saved {}", output.display());
        Ok(())
    } else {
        println!("Cancelled; no changes written.");
        Ok(())
    };

    sweeper.stop(None);
    sweeper_handle.await.ok();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_keeps_extension() {
        assert_eq!(
            default_output(Path::new("/tmp/report.txt")),
            PathBuf::from("/tmp/report_revised.txt")
        );
        assert_eq!(
            default_output(Path::new("notes")),
            PathBuf::from("notes_revised")
        );
    }

    #[test]
    fn test_find_and_replace_must_pair_up() {
        let cli = Cli::parse_from(["editor", "doc.txt", "--find", "a", "--find", "b", "--replace", "x"]);
        assert!(strategy_for(&cli).is_err());

        let cli = Cli::parse_from(["editor", "doc.txt", "--find", "a", "--replace", "x"]);
        let (strategy, _) = strategy_for(&cli).unwrap();
        assert_eq!(strategy, Strategy::literal("a", "x"));
    }

    #[test]
    fn test_format_follows_extension() {
        let cli = Cli::parse_from(["editor", "doc.json", "--find", "a", "--replace", "b"]);
        assert_eq!(codec_for(&cli).name(), "json");
        let cli = Cli::parse_from(["editor", "doc.md", "--find", "a", "--replace", "b", "--format", "json"]);
        assert_eq!(codec_for(&cli).name(), "json");
        let cli = Cli::parse_from(["editor", "doc.md", "--find", "a", "--replace", "b"]);
        assert_eq!(codec_for(&cli).name(), "text");
    }
}
