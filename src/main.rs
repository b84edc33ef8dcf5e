//! CLI for PopRoute
//!
//! Subcommands:
//! - `server`: run a router, dial its peers and serve the attach endpoint
//! - `client`: attach to a router, optionally publish once, print what arrives

use std::time::Duration;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use poproute::broker::{Message, Router, RouterHandle, RoutingTable};
use poproute::config::{LinkTiming, Settings, load_config_from};
use poproute::transport::{Inbound, decode, encode, start_websocket_server};
use poproute::utils::{Result, logging};
use tokio_tungstenite::connect_async;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "poproute")]
enum Command {
    /// Start a router
    Server {
        /// Configuration file (default: config/default, if present)
        #[arg(long)]
        config: Option<String>,
    },
    /// Attach to a router as a subscriber
    Client {
        /// Attach endpoint of the router
        #[arg(long, default_value = "ws://127.0.0.1:8080/subscribe")]
        url: String,
        /// Topic to publish on once attached
        #[arg(long, requires = "payload")]
        topic: Option<String>,
        #[arg(long, requires = "topic")]
        payload: Option<String>,
        /// Messages to print before detaching
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cmd = Command::parse();

    match cmd {
        Command::Server { config } => {
            let settings = match load_config_from(config.as_deref()) {
                Ok(settings) => settings,
                Err(e) => {
                    logging::init(&Settings::default().log);
                    error!("Failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            };
            logging::init(&settings.log);

            if let Err(e) = run_server(settings).await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client {
            url,
            topic,
            payload,
            count,
        } => {
            logging::init(&Settings::default().log);
            let publish = topic
                .zip(payload)
                .map(|(topic, payload)| Message::new(topic, payload));

            if let Err(e) = run_client(&url, publish, count).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server(settings: Settings) -> Result<()> {
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let timing = LinkTiming::from(&settings.link);
    let table = RoutingTable::new(settings.router.routes.clone());
    let router = Router::new(table, settings.router.message_logs).start();

    router.connect_to_peers(&settings.router.peers, timing);

    if settings.router.status_interval_secs > 0 {
        tokio::spawn(report_status(
            router.clone(),
            Duration::from_secs(settings.router.status_interval_secs),
        ));
    }

    tokio::select! {
        result = start_websocket_server(addr, router, settings) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn report_status(router: RouterHandle, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let (Ok(stats), Ok(peers)) = (router.stats().await, router.peer_info().await) else {
            break;
        };
        match serde_json::to_string(&peers) {
            Ok(json) => info!(
                clients = stats.clients,
                bridges = stats.bridges,
                "peer status: {json}"
            ),
            Err(e) => warn!("could not encode peer status: {e}"),
        }
    }
}

async fn run_client(url: &str, publish: Option<Message>, count: usize) -> Result<()> {
    let (mut ws_stream, _response) = connect_async(url).await?;
    info!("attached to {url}");

    if let Some(message) = publish {
        ws_stream.send(encode(&message)?).await?;
    }

    let mut received = 0;
    while received < count {
        let Some(frame) = ws_stream.next().await else {
            break;
        };
        match decode(frame?)? {
            Inbound::Message(message) => {
                received += 1;
                println!(
                    "{}: {}",
                    message.topic,
                    String::from_utf8_lossy(&message.payload)
                );
            }
            Inbound::Close => break,
            Inbound::Ping | Inbound::Pong => {}
        }
    }

    let _ = ws_stream.close(None).await;
    Ok(())
}
