//! CLI entry point for `mailgrab`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailgrab", version, about)]
struct Cli {
    /// Config file (YAML)
    #[arg(short, long, env = "MAILGRAB_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailgrab::load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    setup_logging(cli.verbose, config.input.imap.debug)?;
    info!("mailgrab v{}", env!("CARGO_PKG_VERSION"));

    let report = mailgrab::run(&config).await?;
    info!(
        "done: {} attachments saved to {}, {} messages deleted",
        report.attachments_saved,
        config.input.dir.display(),
        report.deleted
    );
    Ok(())
}

/// Installs the stderr subscriber and routes `log` records into it.
///
/// `RUST_LOG` wins when set. Otherwise the level comes from `-v`, and the
/// config's debug flag turns on debug output plus the IMAP wire dump.
fn setup_logging(verbose: u8, imap_debug: bool) -> anyhow::Result<()> {
    let level = match verbose {
        0 if imap_debug => "debug",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let default_filter = if imap_debug {
        format!("{},mailgrab::wire=trace", level)
    } else {
        level.to_string()
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;
    tracing_log::LogTracer::init().context("bridging log records")?;
    Ok(())
}
