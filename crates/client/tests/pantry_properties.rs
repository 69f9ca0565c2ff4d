use std::collections::BTreeSet;
use std::sync::Arc;

use larder_client::{AddOutcome, PantryController, migrate_local_to_remote};
use larder_core::{Headless, UserId};
use larder_infra::{
    InMemoryDocumentStore, InMemoryKeyValueStore, KeyValueStore, LocalPantryStore,
    RemotePantryStore, local_store::ACTIVE_KEY,
};
use larder_pantry::{Category, NewIngredient};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn local_pantry() -> (PantryController, Arc<InMemoryKeyValueStore>) {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let pantry = PantryController::load(
        LocalPantryStore::new(kv.clone()),
        Arc::new(Headless::approving()),
    )
    .await
    .unwrap();
    (pantry, kv)
}

async fn remote_pantry() -> PantryController {
    let (mut pantry, _) = local_pantry().await;
    let user = UserId::new();
    let store = RemotePantryStore::new(Arc::new(InMemoryDocumentStore::new()), &user);
    pantry.attach_remote(user, store).await.unwrap();
    pantry
}

fn assert_disjoint(pantry: &PantryController) -> Result<(), TestCaseError> {
    let active: BTreeSet<String> = pantry
        .ingredients()
        .into_iter()
        .map(|i| i.id.to_string())
        .collect();
    for item in pantry.trash() {
        prop_assert!(!active.contains(item.ingredient.id.as_str()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Remove(usize),
    Restore(usize),
    Purge(usize),
    ClearTrash,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6usize).prop_map(Op::Add),
        (0..6usize).prop_map(Op::Remove),
        (0..6usize).prop_map(Op::Restore),
        (0..6usize).prop_map(Op::Purge),
        Just(Op::ClearTrash),
    ]
}

const NAMES: [&str; 6] = ["Eggs", "Kale", "Tofu", "Whole Milk", "Sourdough", "Salmon"];

async fn apply(pantry: &mut PantryController, op: &Op) {
    match op {
        Op::Add(n) => {
            pantry
                .add(NewIngredient::new(NAMES[*n], Category::classify(NAMES[*n])))
                .await
                .unwrap();
        }
        Op::Remove(n) => {
            if let Some(item) = pantry.ingredients().get(*n).cloned() {
                pantry.remove(&item.id).await.unwrap();
            }
        }
        Op::Restore(n) => {
            if let Some(item) = pantry.trash().get(*n).cloned() {
                pantry.restore(&item.ingredient.id).await.unwrap();
            }
        }
        Op::Purge(n) => {
            if let Some(item) = pantry.trash().get(*n).cloned() {
                pantry.permanently_delete(&item.ingredient.id).await.unwrap();
            }
        }
        Op::ClearTrash => {
            pantry.clear_trash().await.unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: adding a name already in the fridge changes nothing.
    #[test]
    fn duplicate_add_is_a_no_op(names in prop::collection::vec("[A-Za-z][A-Za-z ]{0,15}", 1..8), pick in any::<prop::sample::Index>()) {
        runtime().block_on(async {
            let (mut pantry, _) = local_pantry().await;
            for name in &names {
                pantry.add(NewIngredient::new(name.clone(), Category::classify(name))).await.unwrap();
            }
            let before = pantry.ingredients();
            let existing = pick.get(&before).name.clone();

            let outcome = pantry.add(NewIngredient::new(existing, Category::Pantry)).await.unwrap();
            prop_assert!(matches!(outcome, AddOutcome::Skipped(_)));
            prop_assert_eq!(pantry.ingredients(), before);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: no identifier is both active and trashed after any operation.
    #[test]
    fn active_and_trash_stay_disjoint(ops in prop::collection::vec(op(), 1..24)) {
        runtime().block_on(async {
            let (mut local, _) = local_pantry().await;
            let mut remote = remote_pantry().await;
            for op in &ops {
                apply(&mut local, op).await;
                assert_disjoint(&local)?;
                apply(&mut remote, op).await;
                assert_disjoint(&remote)?;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: with N local items of which M exist remotely, exactly N - M
    /// records are created and nothing stays local.
    #[test]
    fn migration_creates_only_missing_names(
        local_names in prop::collection::btree_set("[a-z]{1,8}", 0..10),
        remote_names in prop::collection::btree_set("[a-z]{1,8}", 0..10),
    ) {
        runtime().block_on(async {
            let kv = Arc::new(InMemoryKeyValueStore::new());
            let local = LocalPantryStore::new(kv);
            let remote = RemotePantryStore::new(Arc::new(InMemoryDocumentStore::new()), &UserId::new());

            let mut pantry = PantryController::load(local.clone(), Arc::new(Headless::approving()))
                .await
                .unwrap();
            for name in &local_names {
                pantry.add(NewIngredient::new(name.clone(), Category::Pantry)).await.unwrap();
            }
            for name in &remote_names {
                remote.create(NewIngredient::new(name.clone(), Category::Pantry), chrono::Utc::now()).await.unwrap();
            }

            let shared = local_names.intersection(&remote_names).count();
            let report = migrate_local_to_remote(&local, &remote).await.unwrap();

            prop_assert_eq!(report.created, local_names.len() - shared);
            prop_assert_eq!(report.skipped, shared);
            prop_assert_eq!(remote.list_active().await.unwrap().len(), local_names.union(&remote_names).count());
            prop_assert!(local.load_active().await.unwrap().is_empty());
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn stored_collection_round_trips_byte_for_byte() {
    let (mut pantry, kv) = local_pantry().await;
    for name in NAMES {
        pantry
            .add(NewIngredient::new(name, Category::classify(name)).with_expiry("3 days"))
            .await
            .unwrap();
    }
    let written = kv.get(ACTIVE_KEY).await.unwrap().unwrap();

    let store = LocalPantryStore::new(kv.clone());
    let loaded = store.load_active().await.unwrap();
    assert_eq!(loaded, pantry.ingredients());

    store.save_active(&loaded).await.unwrap();
    assert_eq!(kv.get(ACTIVE_KEY).await.unwrap().unwrap(), written);
}

#[tokio::test]
async fn remove_then_restore_returns_the_same_ingredient() {
    let (mut pantry, _) = local_pantry().await;
    let AddOutcome::Added(id) = pantry
        .add(NewIngredient::new("Whole Milk", Category::Dairy))
        .await
        .unwrap()
    else {
        panic!("milk was not added");
    };
    let original = pantry.ingredients().remove(0);

    pantry.remove(&id).await.unwrap();
    pantry.restore(&id).await.unwrap();

    let restored = pantry.ingredients().remove(0);
    assert_eq!(restored.name, original.name);
    assert_eq!(restored.category, original.category);
    assert!(restored.created_at >= original.created_at);
}
