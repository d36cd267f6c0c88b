//! Lobby client
//!
//! Connects to a Phoenix endpoint, joins the configured topics and logs
//! every configured event until Ctrl+C.

use anyhow::{Context, Result};
use phoenix_client::bin_common::{
    init_tracing, load_config_from_env, ClientSettings, ShutdownSignal,
};
use phoenix_client::phoenix_socket::{Channel, Socket, SocketEvent};
use std::time::Duration;
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const LEAVE_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = load_config_from_env();
    let settings = ClientSettings::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&settings.log_level);
    info!("Loaded config from {}", config_path.display());

    let shutdown = ShutdownSignal::new();
    shutdown.spawn_signal_handler();

    let socket = settings.socket_builder().build()?;
    socket.connect();
    info!("Connecting to {}", socket.endpoint_url());

    let channels = settings
        .topics
        .iter()
        .map(|topic| join_topic(&socket, topic, &settings.events))
        .collect::<Result<Vec<_>>>()?;

    while shutdown.is_running() {
        while let Some(event) = socket.try_recv_event() {
            match event {
                SocketEvent::Open => info!("Socket open"),
                SocketEvent::Close(code) => warn!("Socket closed ({code})"),
                SocketEvent::Error(reason) => error!("Socket error: {reason}"),
            }
        }
        shutdown.interruptible_sleep(POLL_INTERVAL).await;
    }

    info!("Leaving {} channel(s)", channels.len());
    socket.cleanup();
    tokio::time::sleep(LEAVE_GRACE).await;
    info!("Shutdown complete");
    Ok(())
}

fn join_topic(socket: &Socket, topic: &str, events: &[String]) -> Result<Channel> {
    let channel = socket.channel(topic);

    for event in events {
        let topic = topic.to_string();
        let name = event.clone();
        channel.on(event.as_str(), move |payload| {
            info!("[{topic}] {name}: {payload}");
        })?;
    }

    let topic_owned = topic.to_string();
    channel.on_error(move |_| warn!("[{topic_owned}] channel errored, will rejoin"))?;

    let (ok_topic, err_topic, timeout_topic) =
        (topic.to_string(), topic.to_string(), topic.to_string());
    channel
        .join()?
        .receive_ok(move |_| info!("[{ok_topic}] joined"))
        .receive_error(move |reason| warn!("[{err_topic}] join refused: {reason}"))
        .receive_timeout(move || warn!("[{timeout_topic}] join timed out"));

    Ok(channel)
}
