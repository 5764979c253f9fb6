//! `aeryu-cli`: headless player for an aeryu music backend.
//!
//! Builds a queue from a playlist or a library search, keeps time with a silent clock
//! output, and accepts transport commands on stdin. Audio is meant to be rendered by the
//! remote agent (`connect`); the local clock keeps checkpoints and the queue moving.

mod commands;
mod view;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use aeryu_player::backend::HttpBackend;
use aeryu_player::config::{PlayerConfig, SessionFileConfig};
use aeryu_player::device::{AudioDevice, ClockDevice};
use aeryu_player::runtime::{SessionHandle, spawn_session};
use aeryu_types::Track;

use crate::commands::{HELP, ReplCommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

const SEARCH_PAGE_SIZE: u32 = 50;

#[derive(Parser, Debug)]
#[command(name = "aeryu-cli", version = VERSION)]
struct Args {
    /// Backend base URL, e.g. http://127.0.0.1:5000 (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start by playing this playlist
    #[arg(long, conflicts_with = "search")]
    playlist: Option<i64>,

    /// Start by playing library search results
    #[arg(long)]
    search: Option<String>,

    /// Queue position to start from
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Initial volume percent (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// Enable shuffle before the first queue is loaded
    #[arg(long)]
    shuffle: bool,

    /// Hand output to the remote agent right away
    #[arg(long)]
    connect: bool,
}

fn load_config(args: &Args) -> Result<PlayerConfig> {
    let file = match args.config.as_ref() {
        Some(path) => SessionFileConfig::load(path)?,
        None => SessionFileConfig::default(),
    };
    let mut cfg = PlayerConfig::from_file(&file)?;
    if let Some(server) = args.server.as_deref() {
        cfg = cfg.with_backend_url(server)?;
    }
    if let Some(pct) = args.volume {
        cfg.initial_volume = f32::from(pct) / 100.0;
    }
    Ok(cfg)
}

async fn fetch_playlist(backend: &HttpBackend, playlist_id: i64) -> Result<Vec<Track>> {
    let playlist = backend.playlist(playlist_id).await?;
    tracing::info!(playlist_id, name = %playlist.name, tracks = playlist.songs.len(), "playlist fetched");
    if playlist.songs.is_empty() {
        bail!("playlist {} ({}) has no tracks", playlist.id, playlist.name);
    }
    Ok(playlist.songs)
}

async fn fetch_search(backend: &HttpBackend, term: &str) -> Result<Vec<Track>> {
    let page = backend.list_songs(Some(term), 1, SEARCH_PAGE_SIZE).await?;
    tracing::info!(term, total = page.total, returned = page.songs.len(), "library searched");
    if page.songs.is_empty() {
        bail!("no tracks match {term:?}");
    }
    Ok(page.songs)
}

async fn execute(handle: &SessionHandle, backend: &HttpBackend, cmd: ReplCommand) -> Result<()> {
    match cmd {
        ReplCommand::Play => handle.play()?,
        ReplCommand::Pause => handle.pause()?,
        ReplCommand::Toggle => handle.toggle_play_pause()?,
        ReplCommand::Next => handle.next()?,
        ReplCommand::Prev => handle.previous()?,
        ReplCommand::Seek(secs) => {
            if handle.seek(secs * 1000).await?.is_none() {
                println!("track duration not known yet");
            }
        }
        ReplCommand::Volume(pct) => handle.set_volume(f32::from(pct) / 100.0)?,
        ReplCommand::Mute => handle.toggle_mute()?,
        ReplCommand::Shuffle => {
            let on = handle.toggle_shuffle().await?;
            println!("shuffle {}", if on { "on" } else { "off" });
        }
        ReplCommand::Repeat => {
            let on = handle.toggle_repeat().await?;
            println!("repeat {}", if on { "on" } else { "off" });
        }
        ReplCommand::Connect => handle.connect_remote()?,
        ReplCommand::Disconnect => handle.disconnect_remote()?,
        ReplCommand::Status => println!("{}", view::format_status(&handle.status().await?)),
        ReplCommand::Load(playlist_id) => {
            let tracks = fetch_playlist(backend, playlist_id).await?;
            handle.load_queue(tracks, 0).await?;
        }
        ReplCommand::Search(term) => {
            let tracks = fetch_search(backend, &term).await?;
            handle.load_queue(tracks, 0).await?;
        }
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Quit => handle.shutdown(),
    }
    Ok(())
}

/// Print notable session events until the session goes away.
async fn print_events(handle: SessionHandle) {
    let mut events = handle.subscribe();
    loop {
        match events.recv().await {
            Ok(aeryu_player::events::PlayerEvent::TrackStarted { .. }) => {
                if let Ok(status) = handle.status().await {
                    println!("> {}", view::format_status(&status));
                }
            }
            Ok(event) => {
                if let Some(line) = view::format_event(&event) {
                    println!("> {line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Read stdin on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.clone()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aeryu_player=info,aeryu_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_config(&args)?;
    tracing::info!(backend = %cfg.backend_url, media = %cfg.media_base_url, "starting");
    let backend = HttpBackend::from_config(&cfg)?;

    let initial = match (args.playlist, args.search.as_deref()) {
        (Some(playlist_id), _) => Some(fetch_playlist(&backend, playlist_id).await?),
        (None, Some(term)) => Some(fetch_search(&backend, term).await?),
        (None, None) => None,
    };

    let tick = cfg.progress_interval;
    let (handle, mut session_task) = spawn_session(
        cfg,
        Arc::new(backend.clone()),
        move |events| -> Box<dyn AudioDevice> { Box::new(ClockDevice::new(events, tick)) },
    );

    let signal_handle = handle.clone();
    let _ = ctrlc::set_handler(move || {
        signal_handle.shutdown();
    });

    tokio::spawn(print_events(handle.clone()));

    if args.shuffle {
        handle.toggle_shuffle().await?;
    }
    if let Some(tracks) = initial {
        handle
            .load_queue(tracks, args.start)
            .await
            .context("start queue")?;
    }
    if args.connect {
        handle.connect_remote()?;
    }

    println!("type `help` for commands");
    let mut lines = spawn_stdin_reader();
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    handle.shutdown();
                    break;
                };
                match commands::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(ReplCommand::Quit)) => {
                        handle.shutdown();
                        break;
                    }
                    Ok(Some(cmd)) => {
                        if let Err(err) = execute(&handle, &backend, cmd).await {
                            eprintln!("error: {err:#}");
                        }
                    }
                    Err(err) => eprintln!("{err}"),
                }
            }
            result = &mut session_task => {
                result.context("session task")?;
                return Ok(());
            }
        }
    }

    session_task.await.context("session task")?;
    Ok(())
}
