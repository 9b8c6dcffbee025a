//! Link monitor
//!
//! Holds one companion link open and relays every event to stdout as JSON
//! lines. Each line read from stdin is parsed as JSON and sent as a
//! `custom_payload` message.
//!
//! ```text
//! LINK_TOKEN=... cargo run --bin link-monitor
//! LINK_CONFIG_PATH=config/staging.yaml cargo run --bin link-monitor
//! cargo run --bin link-monitor -- --config config/staging.yaml
//! ```

use anyhow::{Context, Result};
use companion_link::bin_common::{resolve_config_path, ConfigType};
use companion_link::config::LinkSettings;
use companion_link::forward::write_event;
use companion_link::logging::init_tracing;
use std::io::{stdin, stdout, BufRead, BufWriter};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let config_path = resolve_config_path(std::env::args().skip(1), ConfigType::Link);
    let settings = LinkSettings::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&settings.log_level);
    settings.log();
    if settings.credential.is_none() {
        warn!("LINK_TOKEN is not set, connecting will fail until a token is provided");
    }

    let client = Arc::new(
        livelink::builder()
            .config(settings.to_connection_config())
            .build()
            .context("building link client")?,
    );

    let (_, events) = client.events().subscribe_all_channel();
    let forwarder = std::thread::spawn(move || {
        let mut out = BufWriter::new(stdout().lock());
        // Ends once the bus drops its senders on destroy
        for event in events.iter() {
            if let Err(e) = write_event(&mut out, &event) {
                error!("Failed to write event: {}", e);
                break;
            }
        }
    });

    print_banner("Link monitor", &settings.url);

    if let Err(e) = client.connect(None).await {
        warn!("Initial connect failed: {}", e);
    }

    // Never joined; may still be blocked on stdin at exit
    let input_client = Arc::clone(&client);
    std::thread::spawn(move || relay_stdin(&input_client));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;
    info!("Shutdown requested");

    let stats = client.stats();
    client.destroy().await;

    if forwarder.join().is_err() {
        error!("Event forwarder panicked");
    }

    print_shutdown(
        "Link monitor",
        &format!(
            "sent {} / received {} messages, {} dropped, {} reconnects",
            stats.messages_sent,
            stats.messages_received,
            stats.messages_dropped,
            stats.reconnect_count
        ),
    );
    Ok(())
}

fn relay_stdin(client: &livelink::LinkClient) {
    for line in stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if client.is_destroyed() {
            return;
        }

        match serde_json::from_str(&line) {
            Ok(payload) => {
                let id = client.send_custom(payload, None);
                info!("Sent message {}", id);
            }
            Err(e) => warn!("Ignoring non-JSON input: {}", e),
        }
    }

    info!("stdin closed, no more outbound messages");
}

fn print_banner(name: &str, url: &str) {
    info!("");
    info!("========================================");
    info!("Starting {}", name);
    info!("Link: {}", url);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(name: &str, stats: &str) {
    info!("");
    info!("========================================");
    info!("{} stopped gracefully", name);
    info!("{}", stats);
    info!("========================================");
}
