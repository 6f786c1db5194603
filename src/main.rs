use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use xfade_player::audio::{list_output_devices, AudioOutput, CpalOutput, OfflineOutput};
use xfade_player::cli::{CliApp, ParseError, StatusDisplay};
use xfade_player::config::ConfigManager;
use xfade_player::{logging, AppController, CommandOutcome, PlayerError};

/// Build the controller and apply launch arguments on top of the saved settings
fn build_app(cli: &CliApp) -> Result<AppController, PlayerError> {
    let config_manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Warning: {}; using default settings", e.user_message());
            ConfigManager::with_path(std::env::temp_dir().join("xfplay-config.toml"))
        }
    };

    let output: Box<dyn AudioOutput> = if cli.dry_run {
        Box::new(OfflineOutput::default())
    } else {
        let preferred = cli
            .device
            .clone()
            .or_else(|| config_manager.get_config().preferred_device.clone());
        Box::new(CpalOutput::new(preferred.as_deref())?)
    };

    let mut app = AppController::new(output, config_manager);
    let engine = app.engine_mut();
    if let Some(seconds) = cli.crossfade {
        engine.set_crossfade_seconds(seconds);
    }
    if let Some(curve) = cli.curve {
        engine.set_fade_curve(curve);
    }
    if let Some(level) = cli.volume {
        engine.set_volume(f32::from(level) / 100.0);
    }
    engine.set_shuffle(cli.shuffle);
    engine.set_repeat(cli.repeat);

    for path in &cli.files {
        let path = CliApp::expand_path(&path.to_string_lossy());
        match app.add_path(&path) {
            Ok(count) => info!("Loaded {} track(s) from {}", count, path.display()),
            Err(e) => StatusDisplay::display_error(&e),
        }
    }

    Ok(app)
}

/// Run interactive mode
async fn run_interactive_mode(app: &mut AppController) -> Result<(), PlayerError> {
    println!("xfplay v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
    println!();

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("\nReceived interrupt signal. Shutting down gracefully...");
        shutdown_flag_clone.store(true, Ordering::Relaxed);
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let mut events = app.engine_mut().subscribe();

    let interval_ms = app.config_manager().get_config().progress_interval_ms.max(1);
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    let mut last_tick = Instant::now();

    // Blocking stdin reads live on their own thread
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    if !app.engine().playlist().is_empty() {
        if let Err(e) = app.engine_mut().resume() {
            StatusDisplay::display_error(&e);
        }
    }

    let mut awaiting_input = false;
    loop {
        if shutdown_flag.load(Ordering::Relaxed) {
            break;
        }

        if !awaiting_input {
            print!("> ");
            let _ = std::io::stdout().flush();
            awaiting_input = true;
        }

        tokio::select! {
            biased;

            line = rx.recv() => {
                awaiting_input = false;
                let Some(line) = line else {
                    // stdin closed
                    break;
                };
                if line.is_empty() {
                    continue;
                }
                match CliApp::parse_command(&line) {
                    Ok(command) => match app.execute_command(command).await {
                        Ok(CommandOutcome::Quit) => {
                            println!("Goodbye!");
                            break;
                        }
                        Ok(CommandOutcome::Continue) => {}
                        Err(e) => report_error(&e),
                    },
                    Err(ParseError::HelpRequested) => CliApp::display_help(),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }

            Some(event) = events.recv() => {
                app.report_event(&event);
            }

            _ = interval.tick() => {
                let now = Instant::now();
                let elapsed = now.duration_since(last_tick);
                last_tick = now;
                if let Err(e) = app.tick(elapsed) {
                    report_error(&e);
                    awaiting_input = false;
                }
            }
        }
    }

    app.shutdown();
    Ok(())
}

fn report_error(error: &PlayerError) {
    let level = error.severity().log_level();
    log::log!(level, "{}", error);
    StatusDisplay::display_error(error);
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();

    if cli.list_devices {
        match list_output_devices() {
            Ok(devices) => StatusDisplay::display_devices(&devices),
            Err(e) => {
                StatusDisplay::display_error(&PlayerError::from(e));
                std::process::exit(1);
            }
        }
        return;
    }

    let mut app = match build_app(&cli) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            StatusDisplay::display_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_interactive_mode(&mut app).await {
        StatusDisplay::display_error(&e);
        std::process::exit(1);
    }
}
