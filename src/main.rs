use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
};

use clap::{Parser, Subcommand};
use eframe::{egui::ViewportBuilder, run_native};
use roosty_countdown::{
    audio::PreloadedAudio,
    communication::CountdownSender,
    config::Config,
    coordinator::Coordinator,
    log_sink::LogSink,
    player::PlaybackEngine,
    tray::TrayController,
    trigger::{self, SystemClock},
    AlarmApp, LOG_WINDOW_TITLE,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// settings file, defaults to ./settings.toml or the user config directory
    #[clap(long, short)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write a template settings file
    Init {
        #[clap(long, short)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config_path = Config::resolve_path(args.config);
    if let Some(Command::Init { force }) = args.command {
        return init(&config_path, force);
    }

    // bad settings are fatal, nothing is started before they check out
    let schedule = Config::load(&config_path)?.schedule()?;

    let log = LogSink::create(&schedule.log_file_path)?;
    log.install()?;
    log::info!(
        "loaded {} alarm(s) from {}",
        schedule.alarms.len(),
        config_path.display()
    );

    let audio = PreloadedAudio::preload(&schedule.audio_file_path, &log);
    let engine = PlaybackEngine::spawn(log.clone())?;
    let (countdown_sender, countdown_requests) = mpsc::channel();

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title(LOG_WINDOW_TITLE)
            .with_inner_size([400.0, 300.0]),
        ..Default::default()
    };
    run_native(
        "Roosty Countdown",
        native_options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            log.attach_context(&ctx);
            log.info("running in the background");

            let coordinator = Arc::new(Coordinator::new(
                audio,
                engine,
                CountdownSender::new(countdown_sender, ctx.clone()),
                log.clone(),
            ));
            trigger::spawn_all(
                &schedule.alarms,
                schedule.countdown_seconds,
                &Arc::new(SystemClock),
                &coordinator,
                &log,
            )?;

            let tray = match TrayController::init(&ctx, log.clone()) {
                Ok(tray) => Some(tray),
                Err(e) => {
                    log.error(format!("{e}, closing the log window will exit"));
                    None
                }
            };
            log.info("started, waiting for alarms");
            Ok(Box::new(AlarmApp::new(log, tray, countdown_requests)))
        }),
    )
    .map_err(|e| e.into())
}

fn init(config_path: &Path, force: bool) -> Result<(), Box<dyn Error>> {
    if config_path.exists() && !force {
        eprintln!(
            "{} already exists, use --force to overwrite it",
            config_path.display()
        );
        return Ok(());
    }
    Config::new().save(config_path)?;
    println!("wrote template settings to {}", config_path.display());
    Ok(())
}
