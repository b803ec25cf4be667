//! End-to-end refresh cycles over the channel transport.
//!
//! Packets are encoded on send and decoded here, the way a connection
//! writer would consume them.

use std::sync::Arc;

use roster_sync::{
    ChannelTransport, LayoutMode, RosterConfig, RosterPacket, RosterSynchronizer, ViewerContext,
    ViewerSession,
};
use tokio::sync::mpsc;

fn drain(rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<RosterPacket> {
    let mut packets = Vec::new();
    while let Ok(bytes) = rx.try_recv() {
        packets.push(RosterPacket::decode(&bytes).unwrap());
    }
    packets
}

fn three_columns() -> RosterConfig {
    RosterConfig::from_json(
        r#"{
            "header": ["<gold>{server}", "{online}/{max}"],
            "footer": ["{tps_color}{tps} TPS"],
            "entries": {
                "enabled": true,
                "layout": "three-columns",
                "left_column": ["<aqua>Server", "{server}"],
                "center_column": ["<yellow>Players", ""],
                "right_column": ["<aqua>You", "{ping}ms"],
                "max_center_players": 5
            }
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_single_mode_scenario() {
    let transport = Arc::new(ChannelTransport::new(256));
    let sync = RosterSynchronizer::with_transport(transport.clone());
    let viewer = ViewerContext::for_session(ViewerSession::new("Alice"));
    let mut rx = transport.connect(viewer.viewer_id());
    sync.attach(viewer.session().clone()).await;

    let mut config = RosterConfig::default();
    config.entries.enabled = true;
    config.entries.lines = vec!["A".into(), "B".into()];

    let report = sync.refresh(&viewer, &config).await;
    assert_eq!(report.adds, 2);
    assert_eq!(sync.tracked(&viewer.viewer_id()).await.len(), 2);
    assert_eq!(drain(&mut rx).len(), 2);

    config.entries.lines = vec!["A".into(), "C".into()];
    let report = sync.refresh(&viewer, &config).await;
    assert_eq!((report.adds, report.updates, report.removes), (0, 1, 0));

    let packets = drain(&mut rx);
    assert_eq!(packets.len(), 1);
    let RosterPacket::Update(entry) = &packets[0] else {
        panic!("expected update, got {:?}", packets[0]);
    };
    assert_eq!(entry.sort_key(), "~01");
    assert_eq!(entry.label().plain_text(), "C");
}

#[tokio::test]
async fn test_three_column_full_cycle() {
    let transport = Arc::new(ChannelTransport::new(256));
    let sync = RosterSynchronizer::with_transport(transport.clone());
    let config = three_columns();
    assert_eq!(config.entries.layout, LayoutMode::ThreeColumns);

    let session = ViewerSession::new("Alice");
    let mut rx = transport.connect(session.viewer_id);
    sync.attach(session.clone()).await;

    let viewer = ViewerContext::for_session(session.clone()).with_participants(3);
    sync.send_header_footer(&viewer, &config).unwrap();
    let report = sync.refresh(&viewer, &config).await;
    // 60 slots minus three participants.
    assert_eq!(report.adds, 57);

    let packets = drain(&mut rx);
    let RosterPacket::HeaderFooter(blocks) = &packets[0] else {
        panic!("expected header/footer first");
    };
    assert_eq!(blocks.header.plain_text(), "roster-sync\n3/100");
    assert_eq!(blocks.footer.plain_text(), "20.00 TPS");

    let mut keys: Vec<String> = packets[1..]
        .iter()
        .map(|p| match p {
            RosterPacket::Add(entry) => entry.sort_key().to_string(),
            other => panic!("expected add, got {other:?}"),
        })
        .collect();
    keys.sort();
    assert_eq!(keys.first().map(String::as_str), Some("!00"));
    assert_eq!(keys.last().map(String::as_str), Some("~59"));

    // Overflow: 9 participants over a cap of 5, counter appears.
    let crowded = viewer.clone().with_participants(9);
    let report = sync.refresh(&crowded, &config).await;
    // Slots 25..31 go to participants; slot 32 swaps padding for the counter.
    assert_eq!((report.adds, report.updates, report.removes), (1, 0, 7));
    let counter = drain(&mut rx).into_iter().find_map(|p| match p {
        RosterPacket::Add(entry) => Some(entry),
        _ => None,
    });
    let counter = counter.expect("overflow counter");
    assert_eq!(counter.label().plain_text(), "...and 4 more");
    assert_eq!(counter.sort_key(), "~32");

    // Teardown: one bulk removal of everything tracked.
    let tracked = sync.tracked(&session.viewer_id).await;
    assert_eq!(sync.teardown(&session.viewer_id).await, tracked.len());
    let packets = drain(&mut rx);
    assert_eq!(packets, vec![RosterPacket::RemoveAll(tracked)]);

    let stats = sync.stats().await;
    assert_eq!(stats.teardowns, 1);
    assert_eq!(stats.active_viewers, 0);
    assert_eq!(stats.send_failures, 0);
}

#[tokio::test]
async fn test_disconnected_viewer_counts_failures() {
    let transport = Arc::new(ChannelTransport::new(256));
    let sync = RosterSynchronizer::with_transport(transport.clone());
    let viewer = ViewerContext::for_session(ViewerSession::new("Offline"));
    sync.attach(viewer.session().clone()).await;

    let mut config = RosterConfig::default();
    config.entries.enabled = true;
    config.entries.lines = vec!["A".into(), "B".into()];

    // No channel: sends fail, cache still records the intended state.
    let report = sync.refresh(&viewer, &config).await;
    assert_eq!(report.failed_sends, 2);
    assert_eq!(sync.tracked(&viewer.viewer_id()).await.len(), 2);
    assert!(sync.refresh(&viewer, &config).await.is_noop());

    assert_eq!(sync.stats().await.send_failures, 2);
    assert_eq!(transport.stats().packets_dropped, 2);
}

#[tokio::test]
async fn test_concurrent_refreshes_for_many_viewers() {
    let transport = Arc::new(ChannelTransport::new(1024));
    let sync = Arc::new(RosterSynchronizer::with_transport(transport.clone()));
    let config = Arc::new(three_columns());

    let mut receivers = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let session = ViewerSession::new(format!("viewer-{i}"));
        receivers.push(transport.connect(session.viewer_id));
        sync.attach(session.clone()).await;

        let sync = sync.clone();
        let config = config.clone();
        tasks.push(tokio::spawn(async move {
            let viewer = ViewerContext::for_session(session).with_participants(i);
            for _ in 0..5 {
                sync.refresh(&viewer, &config).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(sync.viewer_count().await, 16);
    let stats = sync.stats().await;
    assert_eq!(stats.refreshes, 80);
    // Only the first refresh per viewer sends anything.
    for rx in &mut receivers {
        let packets = drain(rx);
        assert!(packets.iter().all(|p| matches!(p, RosterPacket::Add(_))));
    }

    assert_eq!(sync.shutdown().await as u64, stats.adds);
}
