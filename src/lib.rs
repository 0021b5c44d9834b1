pub mod cli;
pub mod db;
pub mod remote;
pub mod render;
pub mod sensing;
pub mod session;
pub mod settings;
pub mod tracking;
pub mod utils;

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::time::{Duration, MissedTickBehavior};

use cli::{CliArgs, Command};
use db::{Database, MAX_ERROR_ENTRIES};
use remote::{BackendClient, RemoteApi};
use sensing::{CameraSpec, SyntheticScene};
use session::SessionController;
use settings::{Settings, SettingsStore};

pub fn run() {
    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{}", cli::USAGE);
        return;
    }

    let debug = std::env::var("HEMISCOPE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    if let Err(err) = try_run(args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn try_run(args: CliArgs) -> Result<()> {
    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let store = SettingsStore::new(data_dir.join("settings.json"))?;
    if store.write_if_missing()? {
        info!("wrote default settings to {}", data_dir.join("settings.json").display());
    }
    let mut settings = store.get().with_env_overrides();
    if let Some(url) = &args.backend {
        settings.backend.base_url = url.clone();
    }

    let database = Database::new(data_dir.join("hemiscope.sqlite3"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        if args.command == Command::Errors {
            return print_errors(&database).await;
        }

        let client = BackendClient::new(
            &settings.backend.base_url,
            settings.backend.request_timeout(),
        )?;
        info!("hemiscope using backend {}", client.base_url());
        let api: Arc<dyn RemoteApi> = Arc::new(client);
        let controller = SessionController::new(Arc::clone(&api), Some(database), &settings);

        match args.command {
            Command::Run => run_session(&controller, &args, &settings).await,
            Command::Status => {
                controller.check_health_once().await;
                println!("{}", render::status_line(&controller.snapshot().await));
                Ok(())
            }
            Command::Connect => {
                let snapshot = controller.connect(args.webcam).await?;
                println!("{}", render::connection_banner(&snapshot));
                Ok(())
            }
            Command::Disconnect => {
                api.disconnect().await?;
                println!("disconnected");
                Ok(())
            }
            Command::Reset => {
                controller.reset().await?;
                println!("reset");
                Ok(())
            }
            Command::Errors => Ok(()),
        }
    })
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("hemiscope"))
        .context("No platform data directory; pass --data-dir")
}

fn camera_spec(args: &CliArgs, settings: &Settings) -> Option<CameraSpec> {
    if let Some(gaze) = args.synthetic {
        return Some(CameraSpec::Synthetic(SyntheticScene::looking(gaze)));
    }
    if let Some(dir) = &args.frames {
        return Some(CameraSpec::Frames(dir.clone()));
    }
    if settings.camera.enabled {
        return settings.camera.frames_dir.clone().map(CameraSpec::Frames);
    }
    None
}

async fn run_session(
    controller: &SessionController,
    args: &CliArgs,
    settings: &Settings,
) -> Result<()> {
    controller.start_health_check().await;

    if let Err(err) = controller.connect(args.webcam).await {
        warn!("starting disconnected: {err:#}");
    }

    if let Some(spec) = camera_spec(args, settings) {
        // Failures are already logged and recorded; keep running without a camera.
        let _ = controller.enable_camera(&spec).await;
    }

    render_until_stopped(controller, settings, std::io::stdout(), ctrl_c()).await
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {err}");
    }
}

/// Redraw the status line until `stop` resolves or the terminal goes away,
/// then tear the session down.
async fn render_until_stopped<W, F>(
    controller: &SessionController,
    settings: &Settings,
    mut out: W,
    stop: F,
) -> Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    let period = if settings.debug {
        settings.polling.smoothing_interval()
    } else {
        Duration::from_millis(500)
    };
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let line = render::status_line(&controller.snapshot().await);
                if let Err(err) = draw(&mut out, &line, settings.debug) {
                    error!("terminal output failed: {err}");
                    break;
                }
            }
            _ = &mut stop => {
                let _ = writeln!(out);
                break;
            }
        }
    }

    info!("shutting down");
    controller.shutdown().await
}

fn draw(out: &mut impl Write, line: &str, scroll: bool) -> std::io::Result<()> {
    if scroll {
        writeln!(out, "{line}")?;
    } else {
        write!(out, "\r{line}\x1b[K")?;
    }
    out.flush()
}

async fn print_errors(database: &Database) -> Result<()> {
    let entries = database.recent_errors(MAX_ERROR_ENTRIES as usize).await?;
    if entries.is_empty() {
        println!("no errors recorded");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{} {:<14} {}{}",
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            entry.source.as_str(),
            entry.message,
            entry
                .session_id
                .map(|id| format!(" (session {})", &id[..id.len().min(8)]))
                .unwrap_or_default()
        );
    }
    Ok(())
}
