mod config;
mod config_cmd;
mod init;
mod input;
mod session;

use clap::{Parser, Subcommand};
use config::{Config, ConfigPaths};
use input::{ReplaySource, StdinSource};
use jimaku_core::source::SnapshotSource;
use jimaku_core::stream::{LineReceiver, LineRecvTimeoutError, StreamProcessor};
use jimaku_core::types::{FinalizedLine, StreamStats};
use log::{LevelFilter, info};
use session::{SessionError, SessionHandle, SessionMetadata};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "jimaku", version, about = "streaming subtitle reconciliation engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    Init(init::InitArgs),
    Config(config_cmd::ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
struct RunArgs {
    /// Replay a recorded JSONL snapshot stream instead of reading stdin
    #[arg(long, value_name = "file")]
    input: Option<PathBuf>,

    /// Export finalized lines and metadata to a session directory
    #[arg(long)]
    session: bool,

    /// Override reconciler.continuation_threshold
    #[arg(long, value_name = "ratio")]
    continuation_threshold: Option<f64>,

    /// Override reconciler.new_line_threshold
    #[arg(long, value_name = "ratio")]
    new_line_threshold: Option<f64>,

    /// Override reconciler.stability_ms
    #[arg(long, value_name = "ms")]
    stability_ms: Option<i64>,

    /// Override reconciler.silence_ms
    #[arg(long, value_name = "ms")]
    silence_ms: Option<i64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.run.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .with_local_timestamps()
        .init()
        .expect("failed to build logger instance");

    let paths = match ConfigPaths::from_home() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("config paths error: {err}");
            std::process::exit(1);
        }
    };

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Some(Command::Init(args)) => init::run(&args, &paths).map_err(Into::into),
        Some(Command::Config(args)) => config_cmd::run(&args, &paths).map_err(Into::into),
        None => run(cli.run, &paths),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: RunArgs, paths: &ConfigPaths) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_create(paths)?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;

    let (source, finished): (Box<dyn SnapshotSource>, Arc<AtomicBool>) = match &args.input {
        Some(path) => {
            let source = ReplaySource::from_path(path)?;
            info!("replaying {} snapshots from {}", source.len(), path.display());
            let finished = source.finished_flag();
            (Box::new(source), finished)
        }
        None => {
            let source = StdinSource::new();
            info!("reading snapshots from stdin (blank line = no subtitle visible)");
            let finished = source.finished_flag();
            (Box::new(source), finished)
        }
    };

    let stats = StreamStats::new();
    let (mut processor, rx) =
        StreamProcessor::start(source, config.reconciler.clone(), stats.clone())?;

    let mut session = if args.session || config.output.session {
        let handle = SessionHandle::start(paths, SessionMetadata::new(config.reconciler.clone())?)?;
        info!("exporting session {}", handle.id());
        Some(handle)
    } else {
        None
    };

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("interrupted, flushing");
            break;
        }
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => handle_line(&line, &config, session.as_mut())?,
            Err(LineRecvTimeoutError::Timeout) => {
                // A quiet poll after EOF means the processor has drained the
                // source; stopping it flushes the trailing candidate.
                if finished.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(LineRecvTimeoutError::Disconnected) => break,
        }
    }

    processor.stop();
    drain_remaining(&rx, &config, session.as_mut())?;

    info!(
        "{} snapshots ({} empty), {} lines finalized, {} dropped",
        stats.snapshots_seen(),
        stats.snapshots_empty(),
        stats.lines_finalized(),
        stats.lines_dropped()
    );

    if let Some(session) = session {
        let metadata = session.finalize()?;
        info!(
            "session {} exported to {}",
            metadata.id,
            paths.sessions_dir.join(&metadata.id).display()
        );
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(value) = args.continuation_threshold {
        config.reconciler.continuation_threshold = value;
    }
    if let Some(value) = args.new_line_threshold {
        config.reconciler.new_line_threshold = value;
    }
    if let Some(value) = args.stability_ms {
        config.reconciler.stability_ms = value;
    }
    if let Some(value) = args.silence_ms {
        config.reconciler.silence_ms = value;
    }
}

fn drain_remaining(
    rx: &LineReceiver,
    config: &Config,
    mut session: Option<&mut SessionHandle>,
) -> Result<(), SessionError> {
    while let Ok(Some(line)) = rx.try_recv() {
        handle_line(&line, config, session.as_deref_mut())?;
    }
    Ok(())
}

fn handle_line(
    line: &FinalizedLine,
    config: &Config,
    session: Option<&mut SessionHandle>,
) -> Result<(), SessionError> {
    if config.output.timestamps {
        println!("[{}ms..{}ms] {}", line.start_ms, line.end_ms, line.text);
    } else {
        println!("{}", line.text);
    }
    if let Some(session) = session {
        session.append(line)?;
    }
    Ok(())
}
