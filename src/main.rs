use clap::{Parser, Subcommand};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tether_bot::application::errors::{ExitStatus, StartupError};
use tether_bot::application::services::Core;
use tether_bot::domain::entities::User;
use tether_bot::domain::traits::Client;
use tether_bot::infrastructure::adapters::ConsoleClient;
use tether_bot::infrastructure::config::Config;
use tether_bot::infrastructure::logging;
use tether_bot::plugins::builtin;

#[derive(Parser)]
#[command(name = "tether-bot")]
#[command(about = "A hot-reloadable plugin bot framework", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config and BOT_TOKEN)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on the console adapter
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_bot(&cli.config, cli.token),
        Commands::Version => {
            println!("tether-bot v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => init_config(&cli.config),
    }
}

fn load_config(config_path: &str, token_override: Option<String>) -> Config {
    let mut config = if Path::new(config_path).exists() {
        match Config::load(config_path) {
            Ok(mut config) => {
                config.apply_env();
                config
            }
            Err(e) => {
                eprintln!("Failed to load config: {}, using defaults", e);
                Config::load_env()
            }
        }
    } else {
        Config::load_env()
    };
    if let Some(token) = token_override {
        config.bot.token = Some(token);
    }
    config
}

fn run_bot(config_path: &str, token_override: Option<String>) -> ExitCode {
    let config = load_config(config_path, token_override);
    logging::init(config.bot.debug, config.bot.production);

    // Plugin panics are contained by the event manager; this only logs them
    panic::set_hook(Box::new(|info| {
        tracing::error!("Panic: {}", info);
    }));

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return ExitCode::from(ExitStatus::LoadFailure.code());
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::from(ExitStatus::LoadFailure.code());
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| rt.block_on(serve(config)))) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            tracing::error!("Startup failed: {}", e);
            ExitCode::from(e.exit_status().code())
        }
        Err(_) => {
            tracing::error!("Unhandled panic, exiting");
            ExitCode::from(ExitStatus::UnhandledPanic.code())
        }
    }
}

async fn serve(config: Config) -> Result<(), StartupError> {
    let core = Core::new(config, builtin::catalog());

    let mut console = None;
    // A failed start has already run the exit hooks
    core.start(|options| {
        let client = Arc::new(ConsoleClient::with_options(options).with_echo());
        console = Some(client.clone());
        Ok(client as Arc<dyn Client>)
    })
    .await?;

    let user = User::new("console").with_username("console");
    match console {
        Some(console) => {
            tokio::select! {
                _ = wait_for_signal() => {}
                result = console.run_stdin(user) => {
                    if let Err(e) = result {
                        tracing::warn!("Console input failed: {}", e);
                    }
                    tracing::info!("Console input closed");
                }
            }
        }
        None => wait_for_signal().await,
    }

    core.shutdown(true).await;
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_config(config_path: &str) -> ExitCode {
    if Path::new(config_path).exists() {
        eprintln!("{} already exists, not overwriting", config_path);
        return ExitCode::FAILURE;
    }
    let yaml = match Config::default_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    match fs::write(config_path, yaml) {
        Ok(()) => {
            println!("Created {}", config_path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to write {}: {}", config_path, e);
            ExitCode::FAILURE
        }
    }
}
