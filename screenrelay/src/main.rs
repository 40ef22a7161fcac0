//! screenrelay entry point.
//!
//! ```text
//! screenrelay -u <UDID> -p <PORT>          Relay screenshots on PORT
//! screenrelay -d -u <UDID> -p <PORT>       Same, with device tool debugging
//! screenrelay --config <path> ...          Load a custom config TOML
//! screenrelay --gen-config                 Write default config to stdout
//! ```

use std::ffi::OsString;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use screenrelay::cli::{self, Invocation};
use screenrelay::config::{ConfigSource, RelayConfig};
use screenrelay_core::{ConnectionAcceptor, Shutdown};

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let program = argv
        .first()
        .map(|a| cli::program_name(a))
        .unwrap_or_else(|| "screenrelay".into());

    let args = match cli::parse(&argv) {
        Invocation::Run(args) => args,
        Invocation::GenConfig => {
            let text = toml::to_string_pretty(&RelayConfig::default())?;
            println!("{text}");
            return Ok(());
        }
        Invocation::Usage => {
            print!("{}", cli::usage(&program));
            return Ok(());
        }
    };

    let (config, source) = RelayConfig::load(&args.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("screenrelay v{}", env!("CARGO_PKG_VERSION"));
    match source {
        ConfigSource::File => info!("loaded config from {}", args.config.display()),
        ConfigSource::Missing => info!(
            "config file {} not found, using defaults",
            args.config.display()
        ),
        ConfigSource::Invalid(e) => warn!(
            "invalid config {}: {e}; using defaults",
            args.config.display()
        ),
    }
    info!("device: {}", args.udid);
    info!("port: {}", args.port);

    let shutdown = Shutdown::new();
    let _signals = shutdown.listen_for_signals();

    let endpoint = config.endpoint(args.port)?;
    let acceptor = ConnectionAcceptor::bind(
        &endpoint,
        config.backend(args.debug),
        args.udid,
        config.relay_options(),
        shutdown,
    )?;

    let summary = acceptor.run().await;
    info!(
        "served {} clients over {} device sessions: {} frames, {} bytes",
        summary.clients_served, summary.sessions_opened, summary.frames_sent, summary.bytes_sent
    );

    Ok(())
}
