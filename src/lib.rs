//! Incremental reconciliation core for a game library list.
//!
//! Snapshots of the library are submitted to a [`ListReconciler`], diffed off the
//! interaction context by identity, and applied to a [`PresentationSurface`] as
//! ordered [`EditScript`]s. Row gestures go through [`RowInteractions`], and
//! emulator settings are read through a [`SettingResolver`].
pub mod config;
pub mod controller;
pub mod converters;
pub mod diff_engine;
pub mod errors;
pub mod identity;
pub mod interaction;
pub mod reconciler;
mod scheduler;
pub mod settings;
pub mod surface;
pub mod types;

pub use config::{ConfigReader, EmulatorConfig};
pub use controller::{GameListController, LibrarySource};
pub use diff_engine::{DiffEngine, diff};
pub use errors::{DiffAborted, ReconcilerError};
pub use identity::Reconcilable;
pub use interaction::{ActivationGate, Notice, PropertiesAction, RowInteractions, StorageProbe, UiCommand};
pub use reconciler::{Applied, ListReconciler};
pub use settings::{MemorySettingStore, SettingKind, SettingResolver, SettingStore, SettingValue};
pub use surface::{PresentationSurface, VecSurface};
pub use types::{EditOp, EditScript, GameRecord, TitleId};
