//! Interactive STOMP client.
//!
//! Reads commands from stdin, one per line:
//!
//! ```text
//! login {host:port} {username} {password}
//! join {channel_name}
//! exit {channel_name}
//! report {file}
//! summary {channel_name} {user} {file}
//! logout
//! ```
//!
//! Notices go to stdout, logs to stderr.

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stomp_client::console;
use stomp_client::ledger::DEFAULT_DATE_FORMAT;
use stomp_client::protocol::DEFAULT_MAX_FRAME_SIZE;
use stomp_client::Client;

#[derive(Parser, Debug)]
#[command(name = "stomp-client")]
#[command(version)]
#[command(about = "Interactive STOMP 1.2 client for channel event reports")]
struct Cli {
    /// Log filter directives, e.g. `stomp_client=debug` (defaults to RUST_LOG, then `warn`)
    #[arg(long)]
    log_filter: Option<String>,

    /// strftime format for event times in summary files
    #[arg(long, default_value = DEFAULT_DATE_FORMAT)]
    date_format: String,

    /// Largest inbound frame in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

fn init_tracing(directives: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_filter.as_deref())?;

    let (client, notices) = Client::builder()
        .date_format(cli.date_format)
        .max_frame_size(cli.max_frame_size)
        .build();

    let printer = tokio::spawn(console::print_notices(notices));
    let inbound = tokio::spawn({
        let client = client.clone();
        async move { client.run_inbound().await }
    });

    client.run_commands(BufReader::new(tokio::io::stdin())).await?;

    // Input is gone; nothing more can be asked of the session.
    client.stop();
    inbound.abort();
    drop(client);
    let _ = inbound.await;
    let _ = printer.await;

    Ok(())
}
