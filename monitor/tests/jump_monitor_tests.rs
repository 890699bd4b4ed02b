
use std::sync::Arc;
use std::time::Duration;

use tokio::test;
use tokio::time::sleep;

use mocks::{MockFeed, RecordingSink, record};
use monitor::jump::JumpMonitor;

const WINDOW: Duration = Duration::from_secs(60);

/// One window plus slack, so the monitor's tick always fires first.
async fn pass_window() {
    sleep(WINDOW + Duration::from_secs(1)).await;
}

#[test(start_paused = true)]
async fn alerts_when_move_reaches_threshold() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    feed.send("BTC", "100.0000");
    feed.send("BTC", "101.0000");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "#alerts-alice");
    assert!(posts[0].1.contains("1.00%"), "got: {}", posts[0].1);
    assert!(posts[0].1.contains("1 minute"), "got: {}", posts[0].1);
}

#[test(start_paused = true)]
async fn bootstrap_event_never_alerts() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.0", false), sink.clone());

    feed.send("BTC", "100");
    pass_window().await;
    pass_window().await;

    assert!(sink.posts().is_empty());
}

#[test(start_paused = true)]
async fn trigger_is_inclusive_at_the_threshold() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    feed.send("BTC", "100");
    feed.send("BTC", "100.5");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("0.50%"), "got: {}", posts[0].1);
}

#[test(start_paused = true)]
async fn below_threshold_moves_stay_silent() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "2.0", false), sink.clone());

    feed.send("BTC", "100");
    feed.send("BTC", "101");
    pass_window().await;

    assert!(sink.posts().is_empty());
}

#[test(start_paused = true)]
async fn latest_sample_wins_within_a_window() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    feed.send("BTC", "100");
    // Both land in the same window; only the later one is compared.
    feed.send("BTC", "105");
    feed.send("BTC", "101");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("1.00%"), "got: {}", posts[0].1);
}

#[test(start_paused = true)]
async fn empty_windows_are_skipped_without_catching_up() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    feed.send("BTC", "100");
    pass_window().await;
    pass_window().await;
    pass_window().await;

    // Baseline is still 100 after the quiet windows.
    feed.send("BTC", "101");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("1.00%"), "got: {}", posts[0].1);
}

#[test(start_paused = true)]
async fn baseline_rolls_forward_after_every_sample() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    feed.send("BTC", "100");
    feed.send("BTC", "101");
    pass_window().await;

    // Second window compares against 101, not 100.
    feed.send("BTC", "101");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1, "flat second window must not alert");
}

#[test(start_paused = true)]
async fn other_coins_are_ignored() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    feed.send("ETH", "100");
    feed.send("eth", "500");
    feed.send("BTC", "100");
    feed.send("BTC", "103");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("3.00%"), "got: {}", posts[0].1);
}

#[test(start_paused = true)]
async fn paused_monitor_computes_but_does_not_deliver() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", true), sink.clone());

    feed.send("BTC", "100");
    feed.send("BTC", "102");
    pass_window().await;
    assert!(sink.posts().is_empty(), "paused monitor must not deliver");

    // Resume mutes nothing more and does not reset the baseline: the next
    // sample compares against 102.
    monitor.set_paused(false);
    feed.send("BTC", "104");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("1.96%"), "got: {}", posts[0].1);
}

#[test(start_paused = true)]
async fn zero_baseline_skips_comparison_then_recovers() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let _monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    feed.send("BTC", "0");
    feed.send("BTC", "101");
    pass_window().await;
    // 0 → 101 is an undefined percentage: skipped, baseline becomes 101.
    assert!(sink.posts().is_empty());

    feed.send("BTC", "102.01");
    pass_window().await;

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.contains("1.00%"), "got: {}", posts[0].1);
}

#[test(start_paused = true)]
async fn halt_detaches_cleanly_and_is_idempotent() {
    let feed = MockFeed::new();
    let sink = Arc::new(RecordingSink::default());
    let monitor = JumpMonitor::spawn(&feed, &record("alice", "BTC", 60, "0.5", false), sink.clone());

    // Halt before the bootstrap event has even arrived.
    monitor.halt();
    monitor.halt();

    feed.send("BTC", "100");
    feed.send("BTC", "200");
    pass_window().await;

    assert!(sink.posts().is_empty());
}
