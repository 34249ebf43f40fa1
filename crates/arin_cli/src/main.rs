mod commands;
mod render;

use anyhow::Result;
use arin_core::{ArinConfig, ProgressStore, Session, SubmitError, TurnOutcome};
use arin_memory::{MemoryStore, SqliteStore};
use clap::{Parser, ValueEnum};
use commands::{parse_command, Command, HELP_TEXT};
use rand::rngs::StdRng;
use rand::SeedableRng;
use render::Transcript;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "arin", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "arin.toml")]
    config: PathBuf,

    /// Path to the progression database (overrides config)
    #[arg(short, long, env = "ARIN_DB_PATH")]
    db: Option<PathBuf>,

    /// Chat endpoint URL (overrides config)
    #[arg(short, long, env = "ARIN_ENDPOINT")]
    endpoint: Option<String>,

    /// Use the offline mock responder
    #[arg(long)]
    mock: bool,

    /// Clear saved progression before starting
    #[arg(long)]
    reset: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Keeps the non-blocking file writer alive until exit.
type LogGuard = Option<tracing_appender::non_blocking::WorkerGuard>;

fn init_tracing(args: &Args) -> LogGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let (writer, guard) = match &args.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "arin.log".into());
            let appender = tracing_appender::rolling::never(dir.unwrap_or(std::path::Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
        }
        None => (tracing_subscriber::fmt::writer::BoxMakeWriter::new(io::stderr), None),
    };

    match args.log_format {
        LogFormat::Text => builder.with_writer(writer).init(),
        LogFormat::Json => builder.json().with_writer(writer).init(),
    }
    guard
}

async fn open_store(config: &ArinConfig) -> Arc<dyn ProgressStore> {
    let path = &config.storage.db_path;
    match SqliteStore::new(path).await {
        Ok(store) => {
            info!("Progression stored in {}", path.display());
            Arc::new(store)
        }
        Err(e) => {
            warn!("Cannot open {} ({:#}), progression will not survive restarts", path.display(), e);
            Arc::new(MemoryStore::new())
        }
    }
}

fn print_lines(transcript: &mut Transcript, view: &arin_core::SessionView) {
    for line in transcript.take_new_lines(view) {
        println!("{line}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = init_tracing(&args);

    let mut config = ArinConfig::load_or_default(&args.config);
    if let Some(db) = &args.db {
        config.storage.db_path = db.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.responder.endpoint = endpoint.clone();
    }
    if args.mock {
        config.responder.mock = true;
    }

    info!("Initializing Arin...");
    let store = open_store(&config).await;
    let responder = arin_responder::build_responder(&config)?;
    let settings = config.conversation_settings();
    let session = match config.progression.seed {
        Some(seed) => {
            Session::start_with_rng(settings, responder, store, StdRng::seed_from_u64(seed)).await
        }
        None => Session::start(settings, responder, store).await,
    };

    if args.reset {
        session.reset().await;
    }

    let mut rl = DefaultEditor::new()?;
    let mut transcript = Transcript::default();

    println!("Arin ~  (type /help for commands)");
    let view = session.view().await;
    println!("{}", render::affection_bar(view.progress.count, view.threshold));
    print_lines(&mut transcript, &view);
    if view.progress.ended {
        println!("{}", render::ended_banner(&view.unlock_code));
    }

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        if let Some(command) = parse_command(&line) {
            match command {
                Command::Quit => break,
                Command::Help => println!("{HELP_TEXT}"),
                Command::Status => {
                    let view = session.view().await;
                    println!("{}", render::affection_bar(view.progress.count, view.threshold));
                    if view.progress.ended {
                        println!("{}", render::ended_banner(&view.unlock_code));
                    }
                }
                Command::Reset => {
                    session.reset().await;
                    transcript.rewind();
                    let view = session.view().await;
                    println!("{}", render::affection_bar(view.progress.count, view.threshold));
                    print_lines(&mut transcript, &view);
                }
                Command::Unknown(name) => println!("Unknown command: {name}"),
            }
            continue;
        }

        let _ = rl.add_history_entry(line.as_str());

        let turn = match session.begin(&line).await {
            Ok(turn) => turn,
            Err(SubmitError::Ended) => {
                println!("{}", render::ended_banner(&session.view().await.unlock_code));
                continue;
            }
            // empty input and busy sends are dropped silently
            Err(_) => continue,
        };

        // typing indicator, cleared once the reply lands
        if let Some(placeholder) = session.view().await.log.last() {
            print!("{}", render::format_message(placeholder, false));
            io::stdout().flush()?;
        }
        let outcome = session.dispatch(turn).await;
        print!("\r\x1b[2K");
        io::stdout().flush()?;

        let view = session.view().await;
        print_lines(&mut transcript, &view);

        if let TurnOutcome::Replied { reaction, unlocked, .. } = outcome {
            if reaction.triggered {
                println!("{}", render::affection_bar(view.progress.count, view.threshold));
            }
            if unlocked {
                println!("{}", render::ended_banner(&view.unlock_code));
            }
        }
    }

    info!("Goodbye");
    Ok(())
}
