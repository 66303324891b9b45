//! Accept notes and print what happens
//!
//! ```text
//! SSP_PORT=/dev/ttyUSB0 RUST_LOG=info cargo run --example accept_notes
//! ```

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use ssprust::{Device, DeviceConfig, SerialTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = std::env::var("SSP_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let device = Device::new(SerialTransport::new(&port), DeviceConfig::default());
    device
        .connect()
        .await
        .with_context(|| format!("opening {}", port))?;

    device.sync().await?;
    device.host_protocol_version().await?;
    device.negotiate_encryption().await?;

    let setup = device.setup_request().await?;
    println!("Unit: {} (firmware {})", setup.unit_type, setup.firmware_version);
    for channel in device.channels() {
        println!("  {}", channel);
    }

    device.set_channel_inhibits(0xFFFF).await?;
    device.configure_bezel(0x00, 0xFF, 0x00, false).await?;

    let counters = device.get_counters().await?;
    println!("Counters: {:?}", counters);
    println!("Unit data: {}", device.unit_data().await?);

    let mut notes = device.subscribe();
    device.enable_validator().await?;
    println!("Accepting notes, Ctrl-C to stop");

    loop {
        tokio::select! {
            notification = notes.recv() => match notification {
                Ok(notification) => println!("{}", notification),
                Err(RecvError::Lagged(missed)) => println!("Missed {} notifications", missed),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }

        if !device.is_connected() {
            println!("Device connection lost");
            break;
        }
    }

    if device.is_connected() {
        device.disable_validator().await?;
    }
    device.disconnect().await?;

    Ok(())
}
