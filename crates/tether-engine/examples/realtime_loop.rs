//! Tether RealtimeBridge: a background loop keeping a realm in step.
//!
//! Demonstrates:
//!   1. Building a `PhysicsBridge` over a scene graph and moving it onto
//!      the loop thread with `RealtimeBridge`
//!   2. Staging object additions from another thread via a `BridgeHandle`
//!   3. Watching lifecycle events arrive on a channel subscription
//!   4. Stopping the loop and recovering the bridge
//!
//! Run with:
//!   RUST_LOG=tether_engine=debug cargo run --example realtime_loop

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tether_core::{SceneObject, SceneRealm, SceneType, Transform, TransformProvider};
use tether_engine::{BridgeConfig, MutationKind, PhysicsBridge, RealtimeBridge};
use tether_test_utils::fixtures::{single_realm_world, unit_box};
use tether_test_utils::{MockObject, MockType};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Tether RealtimeBridge Example ===\n");

    let config = BridgeConfig::from_toml_str(
        r#"
        gravity = [0.0, -9.81, 0.0]
        tick_rate_hz = 60.0
        max_step_secs = 0.05
        "#,
    )?;
    let (scene, realm) = single_realm_world();
    let mut bridge = PhysicsBridge::new(scene, config)?;
    bridge.load_world();

    let mut rt = RealtimeBridge::new(bridge);
    let (_, events) = rt.notifier().subscribe_channel();
    rt.start()?;
    println!("loop thread running at 60 Hz");

    // Drop three crates from different heights, from a worker thread.
    let crates: Arc<dyn SceneType> = MockType::physical(unit_box());
    let dropped: Vec<Arc<MockObject>> = (0..3)
        .map(|i| {
            MockObject::with_transform(
                Some(Arc::clone(&crates)),
                Transform::from_position([i as f32 * 3.0, 5.0 + i as f32 * 5.0, 0.0]),
            )
        })
        .collect();
    let handle = rt.handle();
    let realm_id = realm.id();
    let staged: Vec<Arc<dyn SceneObject>> = dropped
        .iter()
        .map(|o| Arc::clone(o) as Arc<dyn SceneObject>)
        .collect();
    thread::spawn(move || handle.stage(realm_id, MutationKind::Addition, staged)).join().ok();

    for _ in 0..5 {
        thread::sleep(Duration::from_millis(200));
        let heights: Vec<String> = dropped
            .iter()
            .map(|o| format!("{:.2}", o.transform().position[1]))
            .collect();
        println!("tick {:>4}: heights [{}]", rt.tick_count(), heights.join(", "));
    }

    let report = rt.stop()?;
    println!(
        "\nstopped after {} ticks ({} ms to join)",
        report.ticks, report.total_ms
    );
    for event in events.try_iter() {
        println!("  event: {event:?}");
    }

    let bridge = rt.into_bridge()?;
    let counters = bridge.counters();
    println!(
        "commits={} added={} realm_faults={}",
        counters.commits, counters.committed_additions, counters.realm_faults
    );
    Ok(())
}
