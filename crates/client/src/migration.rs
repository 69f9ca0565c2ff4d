//! One-time move of locally held pantry data into the signed-in user's
//! cloud collections.
//!
//! Active items whose name already exists remotely are dropped locally
//! without a create. A permission failure aborts the pass and keeps the
//! failing item and everything not yet processed; any other failure keeps
//! just that item and moves on. Trash is copied best effort after the
//! active pass. Local storage ends up holding only what was kept.

use std::collections::HashSet;

use larder_infra::{LocalPantryStore, RemoteError, RemotePantryStore};
use larder_pantry::{Ingredient, NewIngredient, TrashedIngredient};

use crate::controller::PantryError;

#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Remote records created from local active items.
    pub created: usize,
    /// Local active items dropped because the name already existed remotely.
    pub skipped: usize,
    /// Local active items kept for a later attempt.
    pub retained: usize,
    pub trash_moved: usize,
    pub trash_retained: usize,
    /// Set when the pass stopped early.
    pub aborted: Option<RemoteError>,
}

impl MigrationReport {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.created == 0
            && self.skipped == 0
            && self.retained == 0
            && self.trash_moved == 0
            && self.trash_retained == 0
    }
}

fn as_new(item: &Ingredient) -> NewIngredient {
    NewIngredient::new(item.name.clone(), item.category)
        .with_expiry(item.expiry.clone())
        .with_status(item.status)
}

pub async fn migrate_local_to_remote(
    local: &LocalPantryStore,
    remote: &RemotePantryStore,
) -> Result<MigrationReport, PantryError> {
    let active = local.load_active().await?;
    let trash = local.load_trash().await?;
    let mut report = MigrationReport::default();
    if active.is_empty() && trash.is_empty() {
        return Ok(report);
    }

    let mut names: HashSet<String> = match remote.list_active().await {
        Ok(existing) => existing.into_iter().map(|i| i.name).collect(),
        Err(e) => {
            // Creating blindly could duplicate everything; keep it all local.
            tracing::warn!("Migration skipped, cannot list cloud pantry: {}", e);
            report.retained = active.len();
            report.trash_retained = trash.len();
            report.aborted = Some(e);
            return Ok(report);
        }
    };

    let mut remaining: Vec<Ingredient> = Vec::new();
    let mut items = active.into_iter();
    while let Some(item) = items.next() {
        if names.contains(&item.name) {
            tracing::debug!("{:?} already in the cloud pantry, dropping local copy", item.name);
            report.skipped += 1;
            continue;
        }
        match remote.create(as_new(&item), item.created_at).await {
            Ok(created) => {
                names.insert(created.name);
                report.created += 1;
            }
            Err(e) if e.is_permission_denied() => {
                tracing::error!("Migration aborted on {:?}: {}", item.name, e);
                remaining.push(item);
                remaining.extend(items.by_ref());
                report.aborted = Some(e);
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to migrate {:?}: {}", item.name, e);
                remaining.push(item);
            }
        }
    }
    report.retained = remaining.len();

    let mut trash_remaining: Vec<TrashedIngredient> = Vec::new();
    if report.is_aborted() {
        trash_remaining = trash;
    } else {
        for item in trash {
            match remote.create_trash(item.clone()).await {
                Ok(_) => report.trash_moved += 1,
                Err(e) => {
                    tracing::warn!("Failed to migrate trashed {:?}: {}", item.name(), e);
                    trash_remaining.push(item);
                }
            }
        }
    }
    report.trash_retained = trash_remaining.len();

    if remaining.is_empty() {
        local.clear_active().await?;
    } else {
        local.save_active(&remaining).await?;
    }
    if trash_remaining.is_empty() {
        local.clear_trash().await?;
    } else {
        local.save_trash(&trash_remaining).await?;
    }

    tracing::info!(
        "Migration: {} created, {} already present, {} kept locally, {} trashed moved, {} trashed kept",
        report.created,
        report.skipped,
        report.retained,
        report.trash_moved,
        report.trash_retained
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use larder_core::{IngredientId, UserId};
    use larder_infra::{InMemoryDocumentStore, InMemoryKeyValueStore};
    use larder_pantry::Category;

    use super::*;

    struct Setup {
        local: LocalPantryStore,
        remote: RemotePantryStore,
        docs: Arc<InMemoryDocumentStore>,
    }

    fn setup() -> Setup {
        let docs = Arc::new(InMemoryDocumentStore::new());
        Setup {
            local: LocalPantryStore::new(Arc::new(InMemoryKeyValueStore::new())),
            remote: RemotePantryStore::new(docs.clone(), &UserId::new()),
            docs,
        }
    }

    fn local_item(name: &str) -> Ingredient {
        NewIngredient::new(name, Category::classify(name))
            .into_ingredient(IngredientId::generate(), Utc::now())
    }

    async fn seed(s: &Setup, local: &[&str], remote: &[&str]) {
        let items: Vec<Ingredient> = local.iter().map(|n| local_item(n)).collect();
        s.local.save_active(&items).await.unwrap();
        for name in remote {
            s.remote
                .create(NewIngredient::new(*name, Category::Pantry), Utc::now())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn creates_only_names_missing_remotely() {
        let s = setup();
        seed(&s, &["Eggs", "Kale", "Tofu", "Milk"], &["Kale", "Milk"]).await;

        let report = migrate_local_to_remote(&s.local, &s.remote).await.unwrap();

        assert_eq!((report.created, report.skipped, report.retained), (2, 2, 0));
        assert_eq!(s.remote.list_active().await.unwrap().len(), 4);
        assert!(s.local.load_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ordinary_failures_are_retained_and_the_pass_continues() {
        let s = setup();
        seed(&s, &["Eggs", "Kale", "Tofu"], &[]).await;

        s.docs.fail_write_after(1, RemoteError::Unavailable("timeout".into()));
        let report = migrate_local_to_remote(&s.local, &s.remote).await.unwrap();

        assert_eq!((report.created, report.retained), (2, 1));
        assert!(!report.is_aborted());
        let kept = s.local.load_active().await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Kale");
    }

    #[tokio::test]
    async fn permission_denied_aborts_and_keeps_the_rest() {
        let s = setup();
        seed(&s, &["Eggs", "Kale", "Tofu"], &[]).await;
        let trashed = local_item("Old Bread").into_trash(Utc::now());
        s.local.save_trash(&[trashed]).await.unwrap();

        s.docs
            .fail_write_after(1, RemoteError::PermissionDenied("rules".into()));
        let report = migrate_local_to_remote(&s.local, &s.remote).await.unwrap();

        assert!(report.is_aborted());
        assert_eq!((report.created, report.retained, report.trash_retained), (1, 2, 1));
        let kept: Vec<String> = s.local.load_active().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(kept, vec!["Kale", "Tofu"]);
        assert_eq!(s.local.load_trash().await.unwrap().len(), 1);
        assert!(s.remote.list_trash().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_remote_keeps_everything_local() {
        let s = setup();
        seed(&s, &["Eggs"], &[]).await;

        s.docs.fail_next_read(RemoteError::Unavailable("offline".into()));
        let report = migrate_local_to_remote(&s.local, &s.remote).await.unwrap();

        assert!(report.is_aborted());
        assert_eq!(report.retained, 1);
        assert_eq!(s.local.load_active().await.unwrap().len(), 1);
        assert_eq!(s.docs.write_count(), 0);
    }

    #[tokio::test]
    async fn trash_moves_without_duplicate_checks() {
        let s = setup();
        let bread = local_item("Bread");
        s.local
            .save_trash(&[bread.clone().into_trash(Utc::now()), bread.into_trash(Utc::now())])
            .await
            .unwrap();

        let report = migrate_local_to_remote(&s.local, &s.remote).await.unwrap();

        assert_eq!(report.trash_moved, 2);
        assert_eq!(s.remote.list_trash().await.unwrap().len(), 2);
        assert!(s.local.load_trash().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nothing_local_means_no_remote_traffic() {
        let s = setup();
        s.docs.set_deny_all(true);
        let report = migrate_local_to_remote(&s.local, &s.remote).await.unwrap();
        assert!(report.is_empty());
        assert!(!report.is_aborted());
    }
}
