use batbus::bus::SimBus;
use batbus::node::{BatteryNode, NodeConfig, DRIVER_TICK_MS};
use batbus::protocol::{JsonFrameCodec, MessageBody, PGN_BATTERY_CONFIG, PGN_BATTERY_STATUS};

fn test_node() -> BatteryNode<SimBus, JsonFrameCodec> {
    BatteryNode::new(NodeConfig::default(), SimBus::new(), JsonFrameCodec::new())
}

fn drive(node: &mut BatteryNode<SimBus, JsonFrameCodec>, from_ms: u64, to_ms: u64) {
    let mut now = from_ms;
    while now <= to_ms {
        node.process_tick(now);
        now += DRIVER_TICK_MS;
    }
}

#[test]
fn test_nothing_published_while_bus_is_closed() {
    let mut node = test_node();

    // Bus never asked to open: ticks pass, timers stay disarmed
    drive(&mut node, 0, 2000);

    assert!(!node.is_bus_open());
    assert!(!node.stats().armed);
    assert_eq!(node.bus().sent_len(), 0);
    assert_eq!(node.stats().status_frames, 0);
    assert_eq!(node.stats().config_frames, 0);
    assert_eq!(node.stats().ticks, 21);
}

#[test]
fn test_schedule_arms_once_when_address_claim_settles() {
    let mut node = test_node();
    node.open_bus().unwrap();

    // Claim takes 250 ms; the first tick past the deadline reports it
    drive(&mut node, 0, 200);
    assert!(!node.is_bus_open());
    assert!(!node.stats().armed);

    drive(&mut node, 300, 300);
    assert!(node.is_bus_open());
    assert!(node.stats().armed);
    assert_eq!(node.stats().armed_at, Some(300));
    assert!(node.schedule().is_armed());

    // Arming is one-shot even as ticks keep draining the bus
    drive(&mut node, 400, 1000);
    assert_eq!(node.stats().armed_at, Some(300));
}

#[test]
fn test_nothing_published_before_first_offset_expires() {
    let mut node = test_node();
    node.open_bus().unwrap();

    // Armed at 300, config offset 500: the first frame is due at 800
    drive(&mut node, 0, 700);
    assert!(node.is_bus_open());
    assert_eq!(node.bus().sent_len(), 0);
}

#[test]
fn test_first_frames_follow_the_configured_stagger() {
    let mut node = test_node();
    node.open_bus().unwrap();

    // Armed at 300: config due at 800 and 1800, status not until 2300
    drive(&mut node, 0, 2400);

    let frames = node.bus_mut().take_sent();
    let pgns: Vec<u32> = frames.iter().map(|f| f.pgn()).collect();
    assert_eq!(
        pgns,
        vec![PGN_BATTERY_CONFIG, PGN_BATTERY_CONFIG, PGN_BATTERY_STATUS]
    );

    // The stream opens with the bank description, not a status sample
    let first = JsonFrameCodec::decode(&frames[0]).unwrap();
    assert!(matches!(first, MessageBody::BatteryConfig(_)));
}

#[test]
fn test_steady_cadence_after_the_stagger() {
    let mut node = test_node();
    node.open_bus().unwrap();

    // Armed at 300. Config fires at 800 + n*1000, status at 2300 + n*500.
    drive(&mut node, 0, 6000);

    assert_eq!(node.stats().config_frames, 6);
    assert_eq!(node.stats().status_frames, 8);
    assert_eq!(node.bus().frames_sent(), 14);
    assert_eq!(node.stats().send_failures, 0);
}

#[test]
fn test_status_current_tracks_the_shunt_between_frames() {
    let mut node = test_node();
    node.open_bus().unwrap();

    node.readings_mut().set_battery_volts(12.8);
    node.readings_mut().set_shunt_volts(0.05);
    node.readings_mut().set_shunt_resistance(0.001);

    // First status frame at 2300 carries the 50 A derivation
    drive(&mut node, 0, 2300);
    let frames = node.bus_mut().take_sent();
    let last = JsonFrameCodec::decode(frames.last().unwrap()).unwrap();
    match last {
        MessageBody::BatteryStatus(fields) => {
            assert_eq!(fields.battery_amps, 50.0);
            assert_eq!(fields.battery_volts, 12.8);
        }
        other => panic!("expected a status body, got {:?}", other),
    }

    // Shunt reading changes between frames; the next frame derives fresh
    node.readings_mut().set_shunt_volts(0.025);
    drive(&mut node, 2400, 2800);
    let frames = node.bus_mut().take_sent();
    let last = JsonFrameCodec::decode(frames.last().unwrap()).unwrap();
    match last {
        MessageBody::BatteryStatus(fields) => assert_eq!(fields.battery_amps, 25.0),
        other => panic!("expected a status body, got {:?}", other),
    }
}

#[test]
fn test_peer_announcements_count_on_the_same_tick() {
    let mut node = test_node();
    node.open_bus().unwrap();
    drive(&mut node, 0, 300);

    node.bus_mut().inject_peer_announcement(10).unwrap();
    node.bus_mut().inject_peer_announcement(11).unwrap();
    node.bus_mut().inject_peer_announcement(12).unwrap();

    // The gauge refreshes after the drain, so this tick already sees them
    drive(&mut node, 400, 400);
    assert_eq!(node.stats().peers_visible, 3);

    // A repeat announcement from a known address changes nothing
    node.bus_mut().inject_peer_announcement(10).unwrap();
    drive(&mut node, 500, 500);
    assert_eq!(node.stats().peers_visible, 3);
}

#[test]
fn test_registry_outage_keeps_last_known_peer_count() {
    let mut node = test_node();
    node.open_bus().unwrap();
    drive(&mut node, 0, 300);

    node.bus_mut().inject_peer_announcement(20).unwrap();
    node.bus_mut().inject_peer_announcement(21).unwrap();
    node.bus_mut().inject_peer_announcement(22).unwrap();
    drive(&mut node, 400, 400);
    assert_eq!(node.stats().peers_visible, 3);

    // Registry goes quiet: the gauge holds the last answer it got
    node.bus_mut().set_registry_available(false);
    node.bus_mut().inject_peer_announcement(23).unwrap();
    drive(&mut node, 500, 900);
    assert_eq!(node.stats().peers_visible, 3);

    // Registry recovers and the fourth device becomes visible
    node.bus_mut().set_registry_available(true);
    drive(&mut node, 1000, 1000);
    assert_eq!(node.stats().peers_visible, 4);
}

#[test]
fn test_custom_timing_config_is_honored() {
    let config = NodeConfig {
        status_period_ms: 200,
        status_offset_ms: 100,
        config_period_ms: 400,
        config_offset_ms: 300,
        ..NodeConfig::default()
    };
    let mut node = BatteryNode::new(config, SimBus::new(), JsonFrameCodec::new());
    node.open_bus().unwrap();

    // Armed at 300: status at 400,600,800,1000; config at 600,1000
    drive(&mut node, 0, 1000);
    assert_eq!(node.stats().status_frames, 4);
    assert_eq!(node.stats().config_frames, 2);
}
