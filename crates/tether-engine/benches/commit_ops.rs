//! Criterion micro-benchmarks for staging, commit and tick throughput.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tether_core::{SceneObject, SceneRealm, SceneType};
use tether_engine::{BridgeConfig, CommitPolicy, MutationKind, PhysicsBridge};
use tether_test_utils::fixtures::{populated_realm, single_realm_world, unit_box};
use tether_test_utils::{MockObject, MockType};

fn on_request() -> BridgeConfig {
    BridgeConfig {
        commit_policy: CommitPolicy::OnRequest,
        ..BridgeConfig::default()
    }
}

/// Stage 1K physical objects, then commit them into an empty realm.
fn bench_stage_commit_1k(c: &mut Criterion) {
    let ty: Arc<dyn SceneType> = MockType::physical(unit_box());
    c.bench_function("stage_commit_1k", |b| {
        b.iter_batched(
            || {
                let (scene, realm) = single_realm_world();
                let mut bridge = PhysicsBridge::new(scene, on_request()).unwrap();
                bridge.load_world();
                let objects: Vec<Arc<dyn SceneObject>> = (0..1000)
                    .map(|_| MockObject::new(Some(Arc::clone(&ty))) as Arc<dyn SceneObject>)
                    .collect();
                (bridge, realm, objects)
            },
            |(mut bridge, realm, objects)| {
                bridge
                    .staging()
                    .stage(realm.id(), MutationKind::Addition, objects);
                black_box(bridge.commit());
            },
            BatchSize::LargeInput,
        );
    });
}

/// Stage from the hot path without committing.
fn bench_stage_only(c: &mut Criterion) {
    let ty: Arc<dyn SceneType> = MockType::physical(unit_box());
    let (scene, realm) = single_realm_world();
    let bridge = PhysicsBridge::new(scene, on_request()).unwrap();
    let obj: Arc<dyn SceneObject> = MockObject::new(Some(ty));
    c.bench_function("stage_single", |b| {
        b.iter(|| {
            black_box(bridge.staging().stage(
                realm.id(),
                MutationKind::Addition,
                [Arc::clone(&obj)],
            ))
        });
    });
}

/// One 60 Hz tick over a realm with 256 bodies.
fn bench_tick_256_bodies(c: &mut Criterion) {
    let ty: Arc<dyn SceneType> = MockType::physical(unit_box());
    let (scene, realm) = single_realm_world();
    populated_realm(&realm, &ty, 256);
    let mut bridge = PhysicsBridge::new(scene, BridgeConfig::default()).unwrap();
    bridge.load_world();
    c.bench_function("tick_256_bodies", |b| {
        b.iter(|| black_box(bridge.tick_with(Duration::from_micros(16_667))));
    });
}

criterion_group!(
    benches,
    bench_stage_commit_1k,
    bench_stage_only,
    bench_tick_256_bodies
);
criterion_main!(benches);
