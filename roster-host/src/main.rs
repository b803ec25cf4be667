//! Roster host: drives `roster-sync` against simulated viewers.
//!
//! Usage: `roster-host [CONFIG.json] [VIEWERS]`
//!
//! Each simulated viewer gets its own packet channel and a consumer task
//! that decodes and logs what it receives. Ping values drift every second
//! so the periodic refresh has something to update. Ctrl-C stops the
//! driver, which tears every viewer down.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use roster_sync::{
    ChannelTransport, DriverHandle, DriverOptions, RosterConfig, RosterDriver, RosterPacket,
    RosterSynchronizer, ViewerProfile, ViewerSession,
};
use tokio::sync::mpsc;

const DEFAULT_VIEWERS: usize = 3;

struct Args {
    config: Option<String>,
    viewers: usize,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        viewers: DEFAULT_VIEWERS,
    };
    for arg in std::env::args().skip(1) {
        match arg.parse::<usize>() {
            Ok(n) => args.viewers = n,
            Err(_) => args.config = Some(arg),
        }
    }
    args
}

/// Bundled demo layout used when no config file is given.
fn demo_config() -> RosterConfig {
    let mut config = RosterConfig {
        header: vec!["<gold><bold>{server}</bold></gold>".into(), "<gray>{online}/{max} online".into()],
        footer: vec!["<gray>TPS: {tps_color}{tps}</gray> <dark_gray>|</dark_gray> <gray>Up {uptime}".into()],
        ..RosterConfig::default()
    };
    config.entries.enabled = true;
    config.entries.layout = roster_sync::LayoutMode::ThreeColumns;
    config.entries.left_column = vec![
        "<aqua><bold>Server".into(),
        "<gray>Version <white>{version}".into(),
        "<gray>Memory <white>{memory_used}/{memory_max} MB".into(),
    ];
    config.entries.center_column = vec!["<yellow><bold>Players".into(), "".into()];
    config.entries.right_column = vec![
        "<aqua><bold>You".into(),
        "<gray>Name <white>{displayname}".into(),
        "<gray>Ping <white>{ping}ms".into(),
    ];
    config.entries.max_center_players = Some(10);
    config
}

/// Decode and log every packet one viewer receives.
async fn consume(name: String, mut rx: mpsc::Receiver<Vec<u8>>) {
    let mut received = 0u64;
    while let Some(bytes) = rx.recv().await {
        received += 1;
        match RosterPacket::decode(&bytes) {
            Ok(RosterPacket::HeaderFooter(blocks)) => {
                debug!("[{name}] header {:?}", blocks.header.plain_text());
            }
            Ok(RosterPacket::RemoveAll(ids)) => {
                info!("[{name}] removed all {} rows", ids.len());
            }
            Ok(packet) => {
                debug!("[{name}] {} {:?}", packet.kind(), packet.identities());
            }
            Err(e) => warn!("[{name}] undecodable packet: {e}"),
        }
    }
    info!("[{name}] stream closed after {received} packets");
}

/// Drift each viewer's ping once per second.
async fn simulate(handle: DriverHandle, mut profiles: Vec<ViewerProfile>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut round: u32 = 0;
    loop {
        ticker.tick().await;
        round = round.wrapping_add(1);
        for (i, profile) in profiles.iter_mut().enumerate() {
            profile.ping_ms = 20 + (round.wrapping_mul(7) + i as u32 * 13) % 80;
            if handle.update_profile(profile.clone()).await.is_err() {
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    info!("Starting roster host...");

    let args = parse_args();
    let config = match &args.config {
        Some(path) => RosterConfig::load(path)?,
        None => demo_config(),
    };

    let transport = Arc::new(ChannelTransport::new(1024));
    let sync = Arc::new(RosterSynchronizer::with_transport(transport.clone()));
    let (driver, handle) = RosterDriver::new(
        sync.clone(),
        config,
        DriverOptions {
            server_name: "roster-host".into(),
            ..DriverOptions::default()
        },
    );
    let driver_task = driver.spawn();

    let mut profiles = Vec::with_capacity(args.viewers);
    let mut consumers = Vec::with_capacity(args.viewers);
    for i in 0..args.viewers {
        let session = ViewerSession::new(format!("viewer-{}", i + 1));
        let rx = transport.connect(session.viewer_id);
        consumers.push(tokio::spawn(consume(session.name.clone(), rx)));

        let profile = ViewerProfile::new(session);
        handle.join(profile.clone()).await?;
        profiles.push(profile);
    }
    info!("{} simulated viewers joined", profiles.len());

    let simulation = tokio::spawn(simulate(handle.clone(), profiles.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");

    simulation.abort();
    handle.shutdown().await?;
    driver_task.await?;

    for profile in &profiles {
        transport.disconnect(&profile.session.viewer_id);
    }
    for consumer in consumers {
        consumer.await?;
    }

    let stats = sync.stats().await;
    let delivery = transport.stats();
    info!(
        "Done: {} refreshes, +{} ~{} -{}, {} packets ({} bytes), {} dropped",
        stats.refreshes,
        stats.adds,
        stats.updates,
        stats.removes,
        delivery.packets_sent,
        delivery.bytes_sent,
        delivery.packets_dropped
    );
    Ok(())
}
