use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use alt_session::logging::{init_logging_with_default, mode_from_env};
use alt_session::{
    CommandSource, ContextSet, FileSink, NoCommands, Session, SessionConfig, ShutdownToken,
    COMMAND_HELP,
};
use alt_tracking::sim::{SimEnvironmentLibrary, SimNetwork, SimTaskFactory};

mod cli;
mod keyboard;

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging_with_default(mode_from_env(), args.log_level.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    args.validate()?;
    let config = args.load_config()?;
    print_banner(&config);

    let network = SimNetwork::new();
    for serial in args.sim_devices() {
        let node = network.connect_device(&serial);
        info!("Simulated device {} on {}", serial, node);
    }

    let contexts = ContextSet::load(
        &SimEnvironmentLibrary,
        &config.primary_environment,
        &config.secondary_environment,
        config.initial_context,
    )
    .context("Failed to create environments")?;

    let sink = FileSink::open(&config.output_path)
        .with_context(|| format!("Failed to open {}", config.output_path.display()))?;

    let token = ShutdownToken::new();
    // SIGINT, SIGTERM and SIGHUP all end the session through the same token
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        if handler_token.cancel() {
            info!("Termination signal received, shutting down");
        }
    })
    .context("Failed to install signal handler")?;

    let mut session = Session::new(
        Box::new(network.clone()),
        Box::new(SimTaskFactory::new(network)),
        contexts,
        Box::new(sink),
        config,
    )
    .context("Failed to start session")?
    .with_shutdown_token(token.clone());

    let (mut commands, keyboard): (Box<dyn CommandSource>, _) = if args.no_keyboard {
        (Box::new(NoCommands), None)
    } else {
        let (commands, handle) = keyboard::spawn(token);
        (Box::new(commands), handle)
    };

    let result = session.run(commands.as_mut()).context("Session aborted");
    drop(session);

    if let Some(handle) = keyboard {
        let _ = handle.join();
    }

    info!("Collector stopped");
    result
}

fn print_banner(config: &SessionConfig) {
    println!("=== alt-collector ===");
    println!("Data file: {}", config.output_path.display());
    println!("Environment: {}", config.initial_context);
    println!("{}", COMMAND_HELP);
}
