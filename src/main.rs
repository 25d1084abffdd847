use clap::Parser;
use log::{info, warn};

use filterplay::audio::{
    select_audio_stream, CancelToken, CpalSinkFactory, DeviceManager, MediaBackend,
    NullSinkFactory, OutputSinkFactory, PlaybackOrchestrator, SessionReport, SymphoniaBackend,
};
use filterplay::cli::{Cli, Commands, PlayArgs, StatusDisplay};
use filterplay::config::ConfigManager;
use filterplay::error::PlayerError;
use filterplay::logging;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let exit_code = match run(&cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            logging::log_error(&err);
            StatusDisplay::display_error(&err);
            1
        }
    };
    std::process::exit(exit_code);
}

/// Run one command. `Ok(false)` means the command ran but did not succeed.
fn run(cli: &Cli) -> Result<bool, PlayerError> {
    match &cli.command {
        Commands::Play(args) => play(cli, args),
        Commands::Probe { url } => probe(url),
        Commands::Devices => {
            let manager = DeviceManager::new();
            let devices = manager.list_devices()?;
            StatusDisplay::display_devices(manager.host_name(), &devices);
            Ok(true)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ConfigManager, PlayerError> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from(path)?,
        None => ConfigManager::new()?,
    };
    info!("configuration loaded from {}", manager.config_path().display());
    Ok(manager)
}

fn play(cli: &Cli, args: &PlayArgs) -> Result<bool, PlayerError> {
    let mut config = load_config(cli)?.get_config().clone();
    config.apply(&args.overrides());
    config.validate()?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Stopping playback...");
        handler_token.cancel();
    }) {
        warn!("could not install Ctrl-C handler: {}", e);
    }

    let sinks: Box<dyn OutputSinkFactory> = if args.null_output {
        Box::new(NullSinkFactory)
    } else {
        Box::new(CpalSinkFactory::new(config.sink_config()))
    };
    let orchestrator = PlaybackOrchestrator::new(
        Box::new(SymphoniaBackend::new()),
        sinks,
        config.pipeline_options(),
    );

    Ok(finish_session(orchestrator.play(&args.url, &cancel)))
}

/// Print the session summary. The orchestrator has already logged any failure.
fn finish_session(report: SessionReport) -> bool {
    StatusDisplay::display_report(&report);
    match report.end {
        Ok(_) => true,
        Err(err) => {
            StatusDisplay::display_error(&PlayerError::from(err));
            false
        }
    }
}

fn probe(url: &str) -> Result<bool, PlayerError> {
    let source = SymphoniaBackend::new().open(url)?;
    let selected = select_audio_stream(url, source.streams()).ok();
    StatusDisplay::display_streams(url, source.streams(), selected);
    Ok(selected.is_some())
}
