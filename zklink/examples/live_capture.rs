//! Print punches as they happen
//!
//! ```text
//! DEVICE_IP=192.168.1.201 CAPTURE_SECS=120 cargo run --example live_capture
//! ```

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use zklink::{Device, DeviceConfig, EventFlags, LiveCaptureOptions, LiveEvent, StopToken};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());
    let secs: u64 = std::env::var("CAPTURE_SECS")
        .ok()
        .map(|s| s.parse())
        .transpose()
        .context("CAPTURE_SECS must be a number of seconds")?
        .unwrap_or(60);

    let config = DeviceConfig::new(ip).with_live_timeout(Duration::from_secs(5));
    let options = LiveCaptureOptions::from(&config).with_events(EventFlags::ATTLOG);

    let mut device = Device::new(config);
    device.connect().await.context("connect")?;

    let stop = StopToken::new();
    let timer = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        timer.stop();
    });

    println!("Capturing for {}s", secs);
    device
        .live_capture(options, &stop, |event| match event {
            LiveEvent::Attendance(punch) => println!("{} (slot {})", punch, punch.uid),
            LiveEvent::Heartbeat => tracing::debug!("waiting for punches"),
        })
        .await?;

    device.disconnect().await?;
    Ok(())
}
