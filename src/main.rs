use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use tome_reader::events::ReaderEvent;
use tome_reader::{logging, DocumentStore, ReaderConfig, ReaderSession};

const EVENT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Parser, Debug)]
#[command(name = "tome")]
#[command(about = "Read very large plain-text documents")]
struct Args {
    path: PathBuf,
    /// Start line (0-based). Defaults to the stored reading position.
    #[arg(long)]
    line: Option<usize>,
    #[arg(long, default_value_t = 40)]
    count: usize,
    #[arg(long, default_value_t = false)]
    chapters: bool,
    /// Store a chapter pattern for this document and rescan.
    #[arg(long)]
    pattern: Option<String>,
    #[arg(long)]
    search: Option<String>,
    /// Print events as JSON lines.
    #[arg(long, default_value_t = false)]
    json: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn wait_for_event(
    session: &mut ReaderSession,
    json: bool,
    mut done: impl FnMut(&ReaderEvent) -> bool,
) -> Result<ReaderEvent> {
    let events = session.wait_for(EVENT_TIMEOUT, &mut done);
    if json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
    }
    match take_match(events, done) {
        Some(event) => Ok(event),
        None => bail!("timed out waiting for the reader"),
    }
}

/// The last event, only when it is the one that was waited for.
fn take_match(
    mut events: Vec<ReaderEvent>,
    mut done: impl FnMut(&ReaderEvent) -> bool,
) -> Option<ReaderEvent> {
    events.pop().filter(|event| done(event))
}

fn print_window(session: &mut ReaderSession, args: &Args) -> Result<()> {
    if args.count == 0 {
        return Ok(());
    }
    let start = session.current_line();
    session.request_window(start, start.saturating_add(args.count - 1));
    let event = wait_for_event(session, args.json, |e| {
        matches!(e, ReaderEvent::ChunkUpdate { .. })
    })?;
    if args.json {
        return Ok(());
    }
    if let ReaderEvent::ChunkUpdate {
        start_line, lines, ..
    } = event
    {
        for (offset, line) in lines.iter().enumerate() {
            println!("{:>7}  {line}", start_line + offset);
        }
    }
    Ok(())
}

fn print_chapters(session: &mut ReaderSession, args: &Args) -> Result<()> {
    match &args.pattern {
        Some(pattern) => session
            .set_chapter_pattern(pattern)
            .context("failed to set chapter pattern")?,
        None => session.request_chapters(true),
    }
    let event = wait_for_event(session, args.json, |e| {
        matches!(
            e,
            ReaderEvent::ScanComplete { .. } | ReaderEvent::ScanFailed { .. }
        )
    })?;
    match event {
        ReaderEvent::ScanFailed { error } => bail!("chapter scan failed: {error}"),
        ReaderEvent::ScanComplete { chapters } if !args.json => {
            for chapter in &chapters {
                println!("{:>7}  {}", chapter.line, chapter.name);
            }
            println!("{} chapters", chapters.len());
        }
        _ => {}
    }
    Ok(())
}

fn print_search(session: &mut ReaderSession, args: &Args, term: &str) -> Result<()> {
    session
        .search(term)
        .with_context(|| format!("failed to search for {term:?}"))?;
    let event = wait_for_event(session, args.json, |e| {
        matches!(e, ReaderEvent::SearchResults(batch) if batch.done)
            || matches!(e, ReaderEvent::SearchFailed { .. })
    })?;
    match event {
        ReaderEvent::SearchFailed { error } => bail!("search failed: {error}"),
        ReaderEvent::SearchResults(batch) if !args.json => {
            for m in &batch.matches {
                println!("{:>7}  {}", m.line, m.content);
            }
            if batch.has_more {
                println!(
                    "{} matches (showing first {})",
                    batch.total_matches,
                    batch.matches.len()
                );
            } else {
                println!("{} matches", batch.total_matches);
            }
        }
        _ => {}
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ReaderConfig::load(path)?,
        None => ReaderConfig::default(),
    };
    let store = match &args.state_dir {
        Some(dir) => DocumentStore::new(dir),
        None => DocumentStore::default_location()
            .context("no home directory found; pass --state-dir")?,
    };

    let mut session = ReaderSession::open(&args.path, config, store)
        .with_context(|| format!("failed to open document {}", args.path.display()))?;

    if let Some(line) = args.line {
        session.report_progress(line);
    }

    print_window(&mut session, args)?;
    if args.chapters || args.pattern.is_some() {
        print_chapters(&mut session, args)?;
    }
    if let Some(term) = &args.search {
        print_search(&mut session, args, term)?;
    }

    session.close();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);
    run(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_chunk(event: &ReaderEvent) -> bool {
        matches!(event, ReaderEvent::ChunkUpdate { .. })
    }

    #[test]
    fn unmatched_last_event_is_not_returned() {
        let events = vec![ReaderEvent::Warning {
            message: "failed to load lines 0-9".into(),
        }];
        assert_eq!(take_match(events, is_chunk), None);
        assert_eq!(take_match(Vec::new(), is_chunk), None);
    }

    #[test]
    fn matched_last_event_is_returned() {
        let chunk = ReaderEvent::ChunkUpdate {
            start_line: 0,
            end_line: 0,
            lines: vec!["a".into()],
            total_lines: 1,
            jump: false,
            target_line: None,
        };
        let events = vec![
            ReaderEvent::ScrollUpdate { target_line: 0 },
            chunk.clone(),
        ];
        assert_eq!(take_match(events, is_chunk), Some(chunk));
    }
}
