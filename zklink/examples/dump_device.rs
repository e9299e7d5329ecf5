//! Print identity, counters, users and the attendance log of one terminal
//!
//! ```text
//! DEVICE_IP=192.168.1.201 RUST_LOG=zklink=debug cargo run --example dump_device
//! ```

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use zklink::{Device, DeviceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());
    let password = std::env::var("DEVICE_PASSWORD")
        .ok()
        .map(|p| p.parse::<u32>())
        .transpose()
        .context("DEVICE_PASSWORD must be numeric")?
        .unwrap_or(0);
    let force_udp = std::env::var("DEVICE_UDP").is_ok();

    let config = DeviceConfig::new(ip).with_password(password).with_force_udp(force_udp);
    let mut device = Device::new(config);
    device.connect().await.context("connect")?;

    device.disable_device().await?;

    let info = device.device_info().await?;
    println!("{}", info);
    println!("Time: {}", device.get_time().await?);
    println!("Network: {:?}", device.network_params().await?);

    device.read_sizes().await?;
    println!("{}", device);

    let users = device.get_users().await?;
    println!("Users ({}):", users.len());
    for user in &users {
        let role = if user.user_type() == zklink::privilege::ADMIN { "admin" } else { "user" };
        println!("  {} [{}] card={} group={}", user, role, user.card, user.group_id);
    }

    let records = device.get_attendance().await?;
    println!("Attendance ({}):", records.len());
    for record in records.iter().rev().take(20) {
        println!("  {}", record);
    }

    device.enable_device().await?;
    device.disconnect().await?;
    Ok(())
}
