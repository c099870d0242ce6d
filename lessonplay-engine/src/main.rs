//! Lesson player (lessonplay) - Main entry point
//!
//! Plays a lesson file from the command line: builds the queue, narrates it
//! with the configured remote voice (or the built-in engine) and logs media
//! and highlight changes until the queue finishes or Ctrl+C.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lessonplay_common::config::PlayerConfig;
use lessonplay_common::events::LessonEvent;
use lessonplay_common::lesson::Lesson;
use lessonplay_engine::LessonSession;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lessonplay
#[derive(Parser, Debug)]
#[command(name = "lessonplay")]
#[command(about = "Lesson narration and media synchronization player")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "LESSONPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite file for pinned media
    #[arg(short, long, global = true, env = "LESSONPLAY_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a lesson JSON file
    Play {
        /// Lesson file
        lesson: PathBuf,

        /// Play only this question
        #[arg(short, long)]
        question: Option<String>,

        /// Multiplier applied to simulated speech durations
        #[arg(long, default_value_t = 1.0)]
        time_scale: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlayerConfig::load(args.config.as_deref(), args.database.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lessonplay={0},lessonplay_engine={0},lessonplay_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting lessonplay v{}", env!("CARGO_PKG_VERSION"));
    info!("Media store: {}", config.database_path.display());

    match args.command {
        Command::Play {
            lesson,
            question,
            time_scale,
        } => play(&config, &lesson, question.as_deref(), time_scale).await,
    }
}

async fn play(
    config: &PlayerConfig,
    path: &Path,
    question: Option<&str>,
    time_scale: f64,
) -> Result<()> {
    let lesson = load_lesson(path).await?;
    info!(
        "Loaded lesson '{}' ({} questions)",
        lesson.title.as_deref().unwrap_or(lesson.lesson_id()),
        lesson.questions.len()
    );

    let session = LessonSession::from_config(lesson, config, time_scale)
        .await
        .context("Failed to open lesson session")?;
    let mut events = session.subscribe();

    if let Some(question) = question {
        session
            .select_question(Some(question))
            .await
            .with_context(|| format!("Failed to select question {}", question))?;
    }

    session
        .toggle_playback()
        .await
        .context("Failed to start playback")?;

    if session.state().await.queue.is_empty() {
        info!("Nothing to play");
        session.close().await;
        return Ok(());
    }

    tokio::select! {
        _ = follow(&mut events) => {}
        _ = shutdown_signal() => {}
    }

    session.close().await;
    info!("Playback session closed");
    Ok(())
}

async fn load_lesson(path: &Path) -> Result<Lesson> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read lesson file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse lesson file {}", path.display()))
}

/// Log events until playback stops
async fn follow(events: &mut broadcast::Receiver<LessonEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        match &event {
            LessonEvent::HighlightRequested { item_id, .. } => info!("Narrating {}", item_id),
            LessonEvent::MediaChanged {
                descriptor: Some(descriptor),
                ..
            } => info!(
                "Media: {} ({:?}{})",
                descriptor.url,
                descriptor.kind,
                if descriptor.is_permanent { ", pinned" } else { "" }
            ),
            LessonEvent::MediaRestored { descriptor } => {
                info!("Restored pinned media for {}", descriptor.source_id)
            }
            LessonEvent::PlaybackFinished { item_count, .. } => {
                info!("Playback finished after {} items", item_count);
                return;
            }
            LessonEvent::PlaybackStateChanged { snapshot, .. } => {
                if !snapshot.is_playing && !snapshot.is_muted {
                    warn!("Playback stopped at item {}", snapshot.current_index);
                    return;
                }
            }
            other => debug!(event = other.name(), "Event"),
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
