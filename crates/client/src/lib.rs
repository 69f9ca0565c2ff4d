//! `larder-client`
//!
//! **Responsibility:** the client-side state of a larder session.
//!
//! - [`PantryController`] owns the fridge and trash collections and picks
//!   local or cloud persistence.
//! - [`migrate_local_to_remote`] moves local data into the cloud on sign-in.
//! - [`Larder`] wires auth, pantry and recipe generation together.

pub mod app;
pub mod config;
pub mod console;
pub mod controller;
pub mod migration;

pub use app::{AppError, Larder, Services};
pub use config::{AuthMode, ClientConfig, ConfigError};
pub use console::ConsoleInteraction;
pub use controller::{
    AddOutcome, BatchReport, ClearTrashReport, Mode, PantryController, PantryError,
    RestoreOutcome, SkipReason,
};
pub use migration::{MigrationReport, migrate_local_to_remote};
