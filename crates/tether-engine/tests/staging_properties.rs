//! Property tests: staged mutations and the commit point.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use tether_core::{ObjectId, SceneObject, SceneRealm, SceneType};
use tether_engine::{BridgeConfig, CommitPolicy, MutationKind, PhysicsBridge};
use tether_test_utils::fixtures::{single_realm_world, unit_box};
use tether_test_utils::{MockObject, MockType};

/// A pool of objects, half physical and half shapeless.
fn pool(size: usize) -> Vec<Arc<dyn SceneObject>> {
    let physical: Arc<dyn SceneType> = MockType::physical(unit_box());
    let shapeless: Arc<dyn SceneType> = MockType::non_physical();
    (0..size)
        .map(|i| {
            let ty = if i % 2 == 0 { &physical } else { &shapeless };
            MockObject::new(Some(Arc::clone(ty))) as Arc<dyn SceneObject>
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn commit_registers_exactly_the_staged_set(
        batches in prop::collection::vec(prop::collection::vec(0usize..12, 0..6), 0..6),
    ) {
        let (scene, realm) = single_realm_world();
        let mut bridge = PhysicsBridge::new(scene, BridgeConfig {
            commit_policy: CommitPolicy::OnRequest,
            ..BridgeConfig::default()
        }).unwrap();
        bridge.load_world();
        let objects = pool(12);

        for batch in &batches {
            let staged = batch.iter().map(|&i| Arc::clone(&objects[i]));
            bridge.staging().stage(realm.id(), MutationKind::Addition, staged);
        }
        let report = bridge.commit();

        let expected: BTreeSet<usize> = batches.iter().flatten().copied().collect();
        let expected_ids: BTreeSet<ObjectId> =
            expected.iter().map(|&i| objects[i].id()).collect();
        let live: Vec<ObjectId> = realm.objects().unwrap().iter().map(|o| o.id()).collect();
        let live_set: BTreeSet<ObjectId> = live.iter().copied().collect();

        prop_assert_eq!(live.len(), live_set.len(), "duplicate in enumeration");
        prop_assert_eq!(&live_set, &expected_ids);
        prop_assert_eq!(report.additions, expected.len());

        let ctx = bridge.context(realm.id()).unwrap();
        for &i in &expected {
            prop_assert_eq!(ctx.has_body(objects[i].id()), i % 2 == 0);
        }
        prop_assert!(bridge.staging().is_empty());
    }

    #[test]
    fn removals_after_additions_leave_the_difference(
        added in prop::collection::btree_set(0usize..10, 0..10),
        removed in prop::collection::btree_set(0usize..10, 0..10),
    ) {
        let (scene, realm) = single_realm_world();
        let mut bridge = PhysicsBridge::new(scene, BridgeConfig {
            commit_policy: CommitPolicy::OnRequest,
            ..BridgeConfig::default()
        }).unwrap();
        bridge.load_world();
        let objects = pool(10);
        let staging = bridge.staging().clone();

        staging.stage(realm.id(), MutationKind::Addition, added.iter().map(|&i| Arc::clone(&objects[i])));
        bridge.commit();
        staging.stage(realm.id(), MutationKind::Removal, removed.iter().map(|&i| Arc::clone(&objects[i])));
        let report = bridge.commit();

        let survivors: BTreeSet<ObjectId> =
            added.difference(&removed).map(|&i| objects[i].id()).collect();
        let live: BTreeSet<ObjectId> = realm.object_ids().into_iter().collect();
        prop_assert_eq!(&live, &survivors);
        prop_assert_eq!(report.removals, added.intersection(&removed).count());
        prop_assert_eq!(bridge.context(realm.id()).unwrap().object_count(), survivors.len());
    }
}
