//! Pantry state controller.
//!
//! The single owner of the fridge and trash collections shown to the user.
//! Signed out (or in local auth mode) it keeps them in memory and rewrites
//! the local key-value store on every change. Signed in to the cloud it
//! reads the live snapshots of the user's collections and never patches
//! them itself: a write becomes visible when the snapshot delivers it.
//!
//! Invariant: after any single operation no identifier is present in both
//! the active collection and the trash.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use larder_core::{DomainError, IngredientId, Interaction, UserId, entity::position_of};
use larder_infra::{
    LocalPantryStore, RemoteError, RemotePantryStore, StorageError, Subscription,
};
use larder_pantry::{
    Ingredient, IngredientPatch, NewIngredient, ShoppingItem, ShoppingList, TrashedIngredient,
};

#[derive(Debug, Error)]
pub enum PantryError {
    #[error("local storage: {0}")]
    Storage(#[from] StorageError),

    #[error("cloud datastore: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// Why an add was ignored. Neither case is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyName,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(IngredientId),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// The user declined restoring a name that is already in the fridge.
    Declined,
    NotFound,
}

/// Result of emptying the trash. Cloud deletes are issued one by one; the
/// ones that failed are listed and their records stay in the trash.
#[derive(Debug, Default)]
pub struct ClearTrashReport {
    pub removed: usize,
    pub failed: Vec<(IngredientId, RemoteError)>,
}

/// Result of adding several ingredients at once (scanner, stocking up).
#[derive(Debug, Default)]
pub struct BatchReport {
    pub added: Vec<IngredientId>,
    pub skipped: usize,
    pub failed: Vec<(String, PantryError)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Local,
    Remote(UserId),
}

enum Backend {
    Local {
        active: Vec<Ingredient>,
        trash: Vec<TrashedIngredient>,
    },
    Remote {
        user: UserId,
        store: RemotePantryStore,
        active: Subscription<Ingredient>,
        trash: Subscription<TrashedIngredient>,
    },
}

pub struct PantryController {
    local: LocalPantryStore,
    interaction: Arc<dyn Interaction>,
    backend: Backend,
    shopping: ShoppingList,
}

impl PantryController {
    /// Start in local mode with whatever the key-value store holds.
    pub async fn load(
        local: LocalPantryStore,
        interaction: Arc<dyn Interaction>,
    ) -> Result<Self, PantryError> {
        let active = local.load_active().await?;
        let trash = local.load_trash().await?;
        let shopping = local.load_shopping().await?;
        tracing::debug!(
            "Loaded {} active and {} trashed ingredients from local storage",
            active.len(),
            trash.len()
        );
        Ok(Self {
            local,
            interaction,
            backend: Backend::Local { active, trash },
            shopping,
        })
    }

    /// Switch to the signed-in user's cloud collections.
    pub async fn attach_remote(
        &mut self,
        user: UserId,
        store: RemotePantryStore,
    ) -> Result<(), PantryError> {
        let active = store.subscribe_active().await?;
        let trash = store.subscribe_trash().await?;
        tracing::info!("Pantry now follows cloud collections of user {}", user);
        self.backend = Backend::Remote {
            user,
            store,
            active,
            trash,
        };
        Ok(())
    }

    /// Drop the cloud subscriptions and go back to local storage.
    pub async fn detach_remote(&mut self) -> Result<(), PantryError> {
        let active = self.local.load_active().await?;
        let trash = self.local.load_trash().await?;
        if matches!(self.backend, Backend::Remote { .. }) {
            tracing::info!("Pantry back on local storage");
        }
        self.backend = Backend::Local { active, trash };
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        match &self.backend {
            Backend::Local { .. } => Mode::Local,
            Backend::Remote { user, .. } => Mode::Remote(*user),
        }
    }

    /// Active ingredients, newest first.
    pub fn ingredients(&self) -> Vec<Ingredient> {
        match &self.backend {
            Backend::Local { active, .. } => active.clone(),
            Backend::Remote { active, .. } => active.current(),
        }
    }

    /// Trashed ingredients, most recently deleted first.
    pub fn trash(&self) -> Vec<TrashedIngredient> {
        match &self.backend {
            Backend::Local { trash, .. } => trash.clone(),
            Backend::Remote { trash, .. } => trash.current(),
        }
    }

    pub fn shopping(&self) -> &ShoppingList {
        &self.shopping
    }

    /// Add an ingredient unless the name is blank or already in the fridge
    /// (exact, case-sensitive match).
    pub async fn add(&mut self, new: NewIngredient) -> Result<AddOutcome, PantryError> {
        let name = new.normalized_name().to_string();
        if name.is_empty() {
            tracing::debug!("Ignoring ingredient with an empty name");
            return Ok(AddOutcome::Skipped(SkipReason::EmptyName));
        }
        if self.ingredients().iter().any(|i| i.name == name) {
            tracing::debug!("Ignoring duplicate ingredient {:?}", name);
            return Ok(AddOutcome::Skipped(SkipReason::Duplicate));
        }

        let now = Utc::now();
        match &mut self.backend {
            Backend::Local { active, .. } => {
                let ingredient = new.into_ingredient(IngredientId::generate(), now);
                let id = ingredient.id.clone();
                let mut next = Vec::with_capacity(active.len() + 1);
                next.push(ingredient);
                next.extend(active.iter().cloned());
                self.local.save_active(&next).await?;
                *active = next;
                Ok(AddOutcome::Added(id))
            }
            Backend::Remote { store, .. } => {
                let created = store.create(new, now).await?;
                Ok(AddOutcome::Added(created.id))
            }
        }
    }

    /// Add several ingredients, continuing past failures.
    pub async fn add_all(&mut self, items: Vec<NewIngredient>) -> BatchReport {
        let mut report = BatchReport::default();
        for new in items {
            let name = new.normalized_name().to_string();
            match self.add(new).await {
                Ok(AddOutcome::Added(id)) => report.added.push(id),
                Ok(AddOutcome::Skipped(_)) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to add {:?}: {}", name, e);
                    report.failed.push((name, e));
                }
            }
        }
        if !report.failed.is_empty() {
            self.interaction.alert(&format!(
                "{} item(s) could not be added. Please try again.",
                report.failed.len()
            ));
        }
        report
    }

    /// Move an ingredient to the trash. Returns `false` if it is not in the
    /// fridge.
    pub async fn remove(&mut self, id: &IngredientId) -> Result<bool, PantryError> {
        let now = Utc::now();
        match &mut self.backend {
            Backend::Local { active, trash } => {
                let Some(pos) = position_of(active, id) else {
                    return Ok(false);
                };
                let mut next_active = active.clone();
                let item = next_active.remove(pos);
                let mut next_trash = Vec::with_capacity(trash.len() + 1);
                next_trash.push(item.into_trash(now));
                next_trash.extend(trash.iter().cloned());

                self.local.save_trash(&next_trash).await?;
                if let Err(e) = self.local.save_active(&next_active).await {
                    if let Err(undo) = self.local.save_trash(trash).await {
                        tracing::error!("Failed to roll back trash after {}: {}", e, undo);
                    }
                    return Err(e.into());
                }
                *active = next_active;
                *trash = next_trash;
                Ok(true)
            }
            Backend::Remote { store, active, .. } => {
                let Some(item) = active.current().into_iter().find(|i| &i.id == id) else {
                    return Ok(false);
                };
                // Copy first; without a trash copy the record is never deleted.
                store.put_trash(&item.into_trash(now)).await?;
                if let Err(e) = store.delete_active(id).await {
                    tracing::warn!("Delete of {} failed after trash copy: {}", id, e);
                    if let Err(undo) = store.delete_trash(id).await {
                        tracing::error!("Failed to withdraw trash copy of {}: {}", id, undo);
                    }
                    return Err(e.into());
                }
                Ok(true)
            }
        }
    }

    /// Bring an ingredient back from the trash with a new creation time.
    ///
    /// In cloud mode restoring a name that is already in the fridge asks the
    /// user first; local restores never check.
    pub async fn restore(&mut self, id: &IngredientId) -> Result<RestoreOutcome, PantryError> {
        let now = Utc::now();
        match &mut self.backend {
            Backend::Local { active, trash } => {
                let Some(pos) = position_of(trash, id) else {
                    return Ok(RestoreOutcome::NotFound);
                };
                let mut next_trash = trash.clone();
                let restored = next_trash.remove(pos).restore(now);
                let mut next_active = Vec::with_capacity(active.len() + 1);
                next_active.push(restored);
                next_active.extend(active.iter().cloned());

                self.local.save_active(&next_active).await?;
                if let Err(e) = self.local.save_trash(&next_trash).await {
                    if let Err(undo) = self.local.save_active(active).await {
                        tracing::error!("Failed to roll back fridge after {}: {}", e, undo);
                    }
                    return Err(e.into());
                }
                *active = next_active;
                *trash = next_trash;
                Ok(RestoreOutcome::Restored)
            }
            Backend::Remote {
                store,
                active,
                trash,
                ..
            } => {
                let Some(item) = trash.current().into_iter().find(|i| &i.ingredient.id == id)
                else {
                    return Ok(RestoreOutcome::NotFound);
                };
                let duplicate = active.current().iter().any(|i| i.name == item.name());
                if duplicate
                    && !self.interaction.confirm(&format!(
                        "\"{}\" is already in your fridge. Restore it anyway?",
                        item.name()
                    ))
                {
                    return Ok(RestoreOutcome::Declined);
                }

                store.put_active(&item.restore(now)).await?;
                if let Err(e) = store.delete_trash(id).await {
                    tracing::warn!("Trash delete of {} failed after restore: {}", id, e);
                    if let Err(undo) = store.delete_active(id).await {
                        tracing::error!("Failed to withdraw restored copy of {}: {}", id, undo);
                    }
                    return Err(e.into());
                }
                Ok(RestoreOutcome::Restored)
            }
        }
    }

    /// Delete a trash record for good. Returns `false` if it is not in the
    /// trash.
    pub async fn permanently_delete(&mut self, id: &IngredientId) -> Result<bool, PantryError> {
        match &mut self.backend {
            Backend::Local { trash, .. } => {
                let Some(pos) = position_of(trash, id) else {
                    return Ok(false);
                };
                let mut next = trash.clone();
                next.remove(pos);
                self.local.save_trash(&next).await?;
                *trash = next;
                Ok(true)
            }
            Backend::Remote { store, trash, .. } => {
                if !trash.current().iter().any(|i| &i.ingredient.id == id) {
                    return Ok(false);
                }
                store.delete_trash(id).await?;
                Ok(true)
            }
        }
    }

    /// Empty the trash.
    pub async fn clear_trash(&mut self) -> Result<ClearTrashReport, PantryError> {
        match &mut self.backend {
            Backend::Local { trash, .. } => {
                self.local.clear_trash().await?;
                let removed = trash.len();
                trash.clear();
                Ok(ClearTrashReport {
                    removed,
                    failed: Vec::new(),
                })
            }
            Backend::Remote { store, trash, .. } => {
                let mut report = ClearTrashReport::default();
                for item in trash.current() {
                    let id = item.ingredient.id;
                    match store.delete_trash(&id).await {
                        Ok(()) => report.removed += 1,
                        Err(e) => {
                            tracing::warn!("Failed to delete trashed {}: {}", id, e);
                            report.failed.push((id, e));
                        }
                    }
                }
                if !report.failed.is_empty() {
                    self.interaction.alert(&format!(
                        "{} item(s) could not be deleted from the trash.",
                        report.failed.len()
                    ));
                }
                Ok(report)
            }
        }
    }

    /// Merge `patch` into an active ingredient. Returns `false` if it is not
    /// in the fridge.
    ///
    /// A rename onto a name another active ingredient already has is
    /// rejected, the same rule `add` applies.
    pub async fn update(
        &mut self,
        id: &IngredientId,
        patch: &IngredientPatch,
    ) -> Result<bool, PantryError> {
        patch.validate()?;
        let mut patch = patch.clone();
        if let Some(name) = patch.name.as_mut() {
            *name = name.trim().to_string();
            if self.ingredients().iter().any(|i| i.name == *name && &i.id != id) {
                tracing::debug!("Refusing to rename {} to duplicate {:?}", id, name);
                return Err(DomainError::invariant(format!("{name:?} is already in your fridge")).into());
            }
        }
        let patch = &patch;
        match &mut self.backend {
            Backend::Local { active, .. } => {
                let Some(pos) = position_of(active, id) else {
                    return Ok(false);
                };
                if patch.is_empty() {
                    return Ok(true);
                }
                let mut next = active.clone();
                patch.apply(&mut next[pos]);
                self.local.save_active(&next).await?;
                *active = next;
                Ok(true)
            }
            Backend::Remote { store, active, .. } => {
                if !active.current().iter().any(|i| &i.id == id) {
                    return Ok(false);
                }
                if !patch.is_empty() {
                    store.update_active(id, patch).await?;
                }
                Ok(true)
            }
        }
    }

    /// Move everything in the fridge to the trash after the user confirms.
    /// Returns how many items were moved.
    pub async fn clear_pantry(&mut self) -> Result<usize, PantryError> {
        let ids: Vec<IngredientId> = self.ingredients().into_iter().map(|i| i.id).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        if !self.interaction.confirm(&format!(
            "Move all {} items in your fridge to the trash?",
            ids.len()
        )) {
            return Ok(0);
        }

        let mut moved = 0;
        let mut failed = 0;
        for id in &ids {
            match self.remove(id).await {
                Ok(true) => moved += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to move {} to the trash: {}", id, e);
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            self.interaction
                .alert(&format!("{failed} item(s) could not be moved to the trash."));
        }
        Ok(moved)
    }

    /// Put a new entry on the shopping list.
    pub async fn shop_add(&mut self, name: &str) -> Result<Option<ShoppingItem>, PantryError> {
        let mut next = self.shopping.clone();
        let Some(item) = next.add(name).cloned() else {
            return Ok(None);
        };
        self.save_shopping(next).await?;
        Ok(Some(item))
    }

    pub async fn shop_toggle(&mut self, id: &IngredientId) -> Result<Option<bool>, PantryError> {
        let mut next = self.shopping.clone();
        let Some(checked) = next.toggle(id) else {
            return Ok(None);
        };
        self.save_shopping(next).await?;
        Ok(Some(checked))
    }

    pub async fn shop_remove(&mut self, id: &IngredientId) -> Result<bool, PantryError> {
        let mut next = self.shopping.clone();
        if !next.remove(id) {
            return Ok(false);
        }
        self.save_shopping(next).await?;
        Ok(true)
    }

    /// Move every checked shopping entry into the fridge. Entries that could
    /// not be added stay on the list.
    pub async fn stock_fridge(&mut self) -> Result<BatchReport, PantryError> {
        let checked: Vec<ShoppingItem> = self.shopping.checked().cloned().collect();
        let mut report = BatchReport::default();
        let mut next = self.shopping.clone();

        for item in checked {
            match self.add(item.to_new_ingredient()).await {
                Ok(outcome) => {
                    match outcome {
                        AddOutcome::Added(id) => report.added.push(id),
                        AddOutcome::Skipped(_) => report.skipped += 1,
                    }
                    next.remove(&item.id);
                }
                Err(e) => {
                    tracing::warn!("Failed to stock {:?}: {}", item.name, e);
                    report.failed.push((item.name, e));
                }
            }
        }

        self.save_shopping(next).await?;
        if !report.failed.is_empty() {
            self.interaction.alert(&format!(
                "{} item(s) could not be moved to the fridge.",
                report.failed.len()
            ));
        }
        Ok(report)
    }

    async fn save_shopping(&mut self, next: ShoppingList) -> Result<(), PantryError> {
        self.local.save_shopping(&next).await?;
        self.shopping = next;
        Ok(())
    }
}
