//! svcmgr-daemon: serves the service manager control API on a Unix socket.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use svcmgr_daemon::config::Settings;
use svcmgr_daemon::socket::SocketListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "/etc/svcmgr/daemon.toml";

/// How long shutdown waits for in-flight requests.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(35);

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_config_path(&args);

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings);

    info!("Starting {} v{}", NAME, VERSION);
    info!(
        config = %config_path,
        socket = %settings.socket.path.display(),
        registry = %settings.registry.path.display(),
        default_service = %settings.registry.default_service,
        escalation = settings.helpers.use_escalation,
        "Configuration loaded"
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(settings, config_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Daemon failed");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(
    settings: Settings,
    config_path: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = SocketListener::bind(Arc::new(settings)).await?;

    let shutdown = Arc::new(Notify::new());
    let mut hangup = unix_signal(SignalKind::hangup())?;

    let run = listener.run(Arc::clone(&shutdown));
    tokio::pin!(run);

    loop {
        tokio::select! {
            result = &mut run => {
                result?;
                break;
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                shutdown.notify_waiters();
                // Let the accept loop observe the notification.
                let _ = (&mut run).await;

                match tokio::time::timeout(DRAIN_TIMEOUT, listener.wait_for_drain()).await {
                    Ok(()) => info!("Graceful shutdown complete"),
                    Err(_) => warn!(
                        "Shutdown timeout after {}s, some connections may be terminated",
                        DRAIN_TIMEOUT.as_secs()
                    ),
                }
                break;
            }
            _ = hangup.recv() => {
                info!("Reload signal received, reloading configuration...");
                match Settings::load(&config_path) {
                    Ok(new_settings) => listener.reload(new_settings),
                    Err(e) => {
                        error!(error = %e, "Failed to reload configuration, keeping existing settings");
                    }
                }
            }
        }
    }

    let metrics = listener.metrics();
    info!(
        requests = metrics.total_requests(),
        failed = metrics.failed_requests(),
        "Daemon stopped"
    );
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match unix_signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_help() {
    println!(
        r#"{} {}
Permission-gated service manager daemon.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information

SIGNALS:
    SIGHUP                 Reload the configuration file
    SIGINT, SIGTERM        Stop accepting connections and drain
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

fn get_config_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match settings.logging.format.to_lowercase().as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer().pretty()).init(),
    }
}
