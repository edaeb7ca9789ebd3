use batbus::bus::SimBus;
use batbus::node::{BatteryNode, NodeConfig};
use batbus::protocol::JsonFrameCodec;

const SAMPLE_STEP_MS: u64 = 10;

fn test_node() -> BatteryNode<SimBus, JsonFrameCodec> {
    let mut node = BatteryNode::new(NodeConfig::default(), SimBus::new(), JsonFrameCodec::new());
    node.seed_button(false);
    node
}

/// Drive the sample loop with the button held from `press_at` until
/// `release_at`, ending at `until`.
fn drive_button(
    node: &mut BatteryNode<SimBus, JsonFrameCodec>,
    press_at: u64,
    release_at: u64,
    until: u64,
) {
    let mut now = 0;
    while now <= until {
        let held = now >= press_at && now < release_at;
        node.readings_mut().set_button_raw(held);
        node.sample_button(now);
        now += SAMPLE_STEP_MS;
    }
}

#[test]
fn test_long_hold_latches_both_presses() {
    let mut node = test_node();

    // Held for 1200 ms: past both thresholds
    drive_button(&mut node, 0, 1200, 1500);

    let events = node.drain_presses();
    assert!(events.short_press);
    assert!(events.long_press);
    assert!(events.any());
    assert_eq!(node.stats().short_presses, 1);
    assert_eq!(node.stats().long_presses, 1);
}

#[test]
fn test_short_pulse_latches_nothing() {
    let mut node = test_node();

    // A 50 ms pulse never clears the 80 ms threshold
    drive_button(&mut node, 0, 50, 500);

    let events = node.drain_presses();
    assert!(!events.any());
    assert_eq!(node.stats().short_presses, 0);
    assert_eq!(node.stats().long_presses, 0);
}

#[test]
fn test_medium_hold_latches_only_the_short_press() {
    let mut node = test_node();

    // 300 ms: past the short threshold, released well before the long one
    drive_button(&mut node, 0, 300, 800);

    let events = node.drain_presses();
    assert!(events.short_press);
    assert!(!events.long_press);
    assert_eq!(node.stats().short_presses, 1);
    assert_eq!(node.stats().long_presses, 0);
}

#[test]
fn test_latches_stay_set_until_drained() {
    let mut node = test_node();
    drive_button(&mut node, 0, 1200, 1500);

    // Idle samples after the release do not clear a pending press
    let mut now = 1510;
    while now <= 3000 {
        node.sample_button(now);
        now += SAMPLE_STEP_MS;
    }

    let events = node.drain_presses();
    assert!(events.short_press);
    assert!(events.long_press);

    // Drain is read-and-clear: a second drain reports nothing new
    let events = node.drain_presses();
    assert!(!events.any());
    assert_eq!(node.stats().short_presses, 1);
    assert_eq!(node.stats().long_presses, 1);
}

#[test]
fn test_separate_presses_accumulate_in_the_stats() {
    let mut node = test_node();

    drive_button(&mut node, 0, 200, 500);
    assert!(node.drain_presses().short_press);

    // Second press, rebased to a later window
    let mut now = 510;
    while now <= 1500 {
        let held = (600..900).contains(&now);
        node.readings_mut().set_button_raw(held);
        node.sample_button(now);
        now += SAMPLE_STEP_MS;
    }
    assert!(node.drain_presses().short_press);

    assert_eq!(node.stats().short_presses, 2);
    assert_eq!(node.stats().long_presses, 0);
}

#[test]
fn test_contact_bounce_does_not_double_count() {
    let mut node = test_node();

    // One press with a 20 ms bounce gap in the middle, then a long tail
    let mut now = 0;
    while now <= 1000 {
        let held = (0..300).contains(&now) && !(140..160).contains(&now);
        node.readings_mut().set_button_raw(held);
        node.sample_button(now);
        now += SAMPLE_STEP_MS;
    }

    let events = node.drain_presses();
    assert!(events.short_press);
    assert!(!events.long_press);
    assert_eq!(node.stats().short_presses, 1);
}
