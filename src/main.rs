use color_eyre::{eyre::eyre, Result};
use nunchuk_bridge::config::NunchukConfig;
use nunchuk_bridge::nunchuk::{
    ChannelSink, EventPacket, I2cTransport, InputDevice, InputEvent, PollEngine, ProtocolTiming,
    Session,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG: &str = "info";

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = NunchukConfig::default_path();
    let config = NunchukConfig::load_or_create(&config_path).await?;
    info!("Using config from {}: {:?}", config_path.display(), config);

    let transport = I2cTransport::bind(&config)
        .map_err(|e| eyre!("Failed to bind nunchuk: {}", e))?;
    let (sink, packets) = ChannelSink::new(config.event_buffer);

    let engine = PollEngine::create(
        Box::new(transport),
        Box::new(sink),
        ProtocolTiming::default(),
        config.partial_frame,
    );
    let mut device = InputDevice::new(Session::new(engine));

    // The bridge itself is the one reader of the event stream.
    info!("Opening {}", device.descriptor().name);
    device
        .open()
        .map_err(|e| eyre!("Failed to open nunchuk device: {}", e))?;

    let consumer = tokio::spawn(consume_packets(packets));

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");

    // Closing joins the poll worker, which blocks; keep it off the runtime threads.
    tokio::task::spawn_blocking(move || device.close()).await??;
    consumer.await?;

    Ok(())
}

async fn consume_packets(mut packets: mpsc::Receiver<EventPacket>) {
    let mut last: Option<Vec<InputEvent>> = None;
    while let Some(packet) = packets.recv().await {
        if last.as_ref() == Some(&packet.events) {
            continue;
        }
        debug!("Packet at {}", packet.timestamp.format("%H:%M:%S.%3f"));
        for event in &packet.events {
            match event {
                InputEvent::Axis { axis, value } => debug!("  {:?} = {}", axis, value),
                InputEvent::Button { button, pressed } => {
                    info!("  Button {:?} bit {}", button, u8::from(*pressed))
                }
            }
        }
        last = Some(packet.events);
    }
    warn!("Event channel closed");
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

/// Filter from `RUST_LOG`-style directives, falling back to `info`
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG))
}

fn setup_logging_env() {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG.to_string());
    FmtSubscriber::builder()
        .with_env_filter(log_filter(&directives))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
