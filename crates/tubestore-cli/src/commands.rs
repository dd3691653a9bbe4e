//! Command handlers for CLI subcommands.

use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tubestore_models::{Channel, ChannelId, Video};
use tubestore_persistence::{Store, StoreError};

use crate::cli::{Commands, OutputFormat};

/// Errors surfaced by CLI commands.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    /// `verify` found problems.
    #[error("dataset has {0} integrity issue(s)")]
    Integrity(usize),
}

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Execute a CLI command against an open store.
pub fn execute(
    command: Commands,
    store: &Store,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Commands::Status => cmd_status(store, format, out),
        Commands::Channels => cmd_channels(store, format, out),
        Commands::Videos { channel } => cmd_videos(store, channel.as_deref(), format, out),
        Commands::Pending => {
            let videos = store.list_videos_needing_transcript()?;
            print_videos(&videos, format, out)
        }
        Commands::Transcripts { channel } => cmd_transcripts(store, &channel, format, out),
        Commands::Sync { channel } => cmd_sync(store, &channel, format, out),
        Commands::Verify => cmd_verify(store, format, out),
        Commands::RebuildIndexes => {
            store.rebuild_indexes()?;
            writeln!(out, "Indexes rebuilt for {}", store.path().display())?;
            Ok(())
        }
    }
}

/// Finds a channel by external ID, falling back to internal ID.
fn resolve_channel(store: &Store, key: &str) -> Result<Channel> {
    match store.get_channel_by_external_id(key) {
        Ok(channel) => Ok(channel),
        Err(e) if e.is_not_found() => Ok(store.get_channel(&ChannelId::from(key))?),
        Err(e) => Err(e.into()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn cmd_status(store: &Store, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let stats = store.stats()?;
    if format == OutputFormat::Json {
        return print_json(&stats, out);
    }

    writeln!(out, "Dataset:     {}", store.path().display())?;
    writeln!(out, "Channels:    {}", stats.channels)?;
    writeln!(out, "Videos:      {}", stats.videos)?;
    writeln!(out, "Transcripts: {}", stats.transcripts)?;
    writeln!(out, "Sync states: {}", stats.sync_states)?;
    writeln!(out, "Pending:     {}", stats.videos_needing_transcript)?;
    Ok(())
}

fn cmd_channels(store: &Store, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let channels = store.list_channels()?;
    if format == OutputFormat::Json {
        return print_json(&channels, out);
    }

    if channels.is_empty() {
        writeln!(out, "No channels.")?;
        return Ok(());
    }
    writeln!(out, "{:<36}  {:<26}  NAME", "ID", "EXTERNAL ID")?;
    for channel in &channels {
        writeln!(
            out,
            "{:<36}  {:<26}  {}",
            channel.id, channel.external_id, channel.name
        )?;
    }
    Ok(())
}

fn cmd_videos(
    store: &Store,
    channel: Option<&str>,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let videos = match channel {
        Some(key) => {
            let channel = resolve_channel(store, key)?;
            store.list_videos_by_channel(&channel.id)?
        }
        None => store.list_videos()?,
    };
    print_videos(&videos, format, out)
}

fn print_videos(videos: &[Video], format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(videos, out);
    }

    if videos.is_empty() {
        writeln!(out, "No videos.")?;
        return Ok(());
    }
    writeln!(out, "{:<36}  {:<12}  {:<3}  TITLE", "ID", "EXTERNAL ID", "TX")?;
    for video in videos {
        let flag = if video.has_transcript { "yes" } else { "no" };
        writeln!(
            out,
            "{:<36}  {:<12}  {:<3}  {}",
            video.id, video.external_id, flag, video.title
        )?;
    }
    Ok(())
}

fn cmd_transcripts(
    store: &Store,
    channel: &str,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let channel = resolve_channel(store, channel)?;
    let transcripts = store.list_transcripts_by_channel(&channel.id)?;
    if format == OutputFormat::Json {
        return print_json(&transcripts, out);
    }

    if transcripts.is_empty() {
        writeln!(out, "No transcripts for {}.", channel.name)?;
        return Ok(());
    }
    writeln!(out, "{:<36}  {:<5}  {:<8}  CHARS", "VIDEO ID", "LANG", "SOURCE")?;
    for t in &transcripts {
        writeln!(
            out,
            "{:<36}  {:<5}  {:<8}  {}",
            t.video_id,
            t.language,
            t.source,
            t.content.chars().count()
        )?;
    }
    Ok(())
}

fn cmd_sync(store: &Store, channel: &str, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let channel = resolve_channel(store, channel)?;
    let state = store.get_sync_state(&channel.id)?;
    if format == OutputFormat::Json {
        return print_json(&state, out);
    }

    let last = state
        .last_sync_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    writeln!(out, "Channel:   {} ({})", channel.name, channel.external_id)?;
    writeln!(out, "Status:    {}", state.status)?;
    writeln!(out, "Last sync: {}", last)?;
    writeln!(out, "Processed: {}", state.videos_processed)?;
    if let Some(error) = &state.last_error {
        writeln!(out, "Error:     {}", error)?;
    }
    Ok(())
}

fn cmd_verify(store: &Store, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let report = store.verify()?;
    if format == OutputFormat::Json {
        print_json(&report, out)?;
    } else if report.is_ok() {
        writeln!(out, "OK: indexes consistent")?;
    } else {
        for issue in &report.issues {
            writeln!(out, "  - {}", issue)?;
        }
    }

    if !report.is_ok() {
        info!(issues = report.issues.len(), "Integrity check failed");
        return Err(CommandError::Integrity(report.issues.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tubestore_models::{SyncState, Transcript};

    fn seeded_store(dir: &std::path::Path) -> (Store, Channel, Video) {
        let store = Store::open_path(dir.join("tubestore.json")).unwrap();
        let mut channel = Channel::new("UCabc", "Test");
        store.create_channel(&mut channel).unwrap();
        let mut video = Video::new("vid1", channel.id.clone()).with_title("Hello world");
        store.create_video(&mut video).unwrap();
        (store, channel, video)
    }

    fn run(store: &Store, command: Commands, format: OutputFormat) -> Result<String> {
        let mut out = Vec::new();
        execute(command, store, format, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_status_table() {
        let dir = tempdir().unwrap();
        let (store, _, _) = seeded_store(dir.path());

        let output = run(&store, Commands::Status, OutputFormat::Table).unwrap();

        assert!(output.contains("Channels:    1"));
        assert!(output.contains("Pending:     1"));
    }

    #[test]
    fn test_videos_by_external_channel_json() {
        let dir = tempdir().unwrap();
        let (store, _, video) = seeded_store(dir.path());

        let output = run(
            &store,
            Commands::Videos {
                channel: Some("UCabc".to_string()),
            },
            OutputFormat::Json,
        )
        .unwrap();

        let parsed: Vec<Video> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, vec![video]);
    }

    #[test]
    fn test_channel_resolves_by_internal_id() {
        let dir = tempdir().unwrap();
        let (store, channel, video) = seeded_store(dir.path());
        let mut transcript = Transcript::new(video.id.clone(), "en", "hello");
        store.create_transcript(&mut transcript).unwrap();

        let output = run(
            &store,
            Commands::Transcripts {
                channel: channel.id.to_string(),
            },
            OutputFormat::Table,
        )
        .unwrap();

        assert!(output.contains(video.id.as_str()));
    }

    #[test]
    fn test_sync_missing_is_error() {
        let dir = tempdir().unwrap();
        let (store, channel, _) = seeded_store(dir.path());

        let err = run(
            &store,
            Commands::Sync {
                channel: "UCabc".to_string(),
            },
            OutputFormat::Table,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Store(ref e) if e.is_not_found()));

        let mut state = SyncState::new(channel.id.clone());
        state.complete(4);
        store.update_sync_state(&mut state).unwrap();
        let output = run(
            &store,
            Commands::Sync {
                channel: "UCabc".to_string(),
            },
            OutputFormat::Table,
        )
        .unwrap();
        assert!(output.contains("Status:    completed"));
        assert!(output.contains("Processed: 4"));
    }

    #[test]
    fn test_verify_clean_dataset() {
        let dir = tempdir().unwrap();
        let (store, _, _) = seeded_store(dir.path());

        let output = run(&store, Commands::Verify, OutputFormat::Table).unwrap();
        assert!(output.contains("OK"));
    }
}
