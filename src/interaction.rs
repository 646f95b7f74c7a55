//! Row gestures: debounce, stale-file detection, and the commands they produce
use crate::types::{GameRecord, TitleId};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Quiet window after an accepted tap during which further taps are ignored.
pub const ACTIVATION_QUIET_WINDOW: Duration = Duration::from_millis(1000);

/// Answers whether a record's backing file is still reachable.
pub trait StorageProbe: Send + Sync {
    fn exists(&self, locator: &str) -> bool;
}

impl<F> StorageProbe for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn exists(&self, locator: &str) -> bool {
        self(locator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// The tapped row points at a file that no longer exists.
    FileNotFound,
    /// The long-pressed row has no title metadata to show.
    PropertiesNotLoaded,
}

/// Buttons of the properties sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertiesAction {
    LaunchGlobalConfig,
    LaunchCustomConfig,
    OpenSettings,
    OpenCheats,
    PinShortcut,
}

/// Side effects for an external dispatcher. The core never performs them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UiCommand {
    ShowNotice { notice: Notice },
    /// Ask the library source for a fresh snapshot and submit it.
    RefreshLibrary,
    RecordLastPlayed { key: String, at_millis: u64 },
    Launch { record: GameRecord, custom_settings: bool },
    ShowProperties(GameRecord),
    /// Settings screen scoped to one title, e.g. `"0004000000030800"`.
    OpenSettings { scope: String },
    OpenCheats { title_id: TitleId },
    PinShortcut { label: String, record: GameRecord },
}

/// Rejects activations that arrive within the quiet window of the last
/// accepted one.
#[derive(Debug, Clone)]
pub struct ActivationGate {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new(ACTIVATION_QUIET_WINDOW)
    }
}

impl ActivationGate {
    pub fn new(window: Duration) -> Self {
        ActivationGate {
            window,
            last_accepted: None,
        }
    }

    pub fn try_accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

pub struct RowInteractions {
    gate: ActivationGate,
    storage: Arc<dyn StorageProbe>,
}

impl RowInteractions {
    pub fn new(storage: Arc<dyn StorageProbe>) -> Self {
        RowInteractions {
            gate: ActivationGate::default(),
            storage,
        }
    }

    pub fn with_gate(mut self, gate: ActivationGate) -> Self {
        self.gate = gate;
        self
    }

    /// Tap on a row: launch with the global config.
    pub fn on_tap(&mut self, record: &GameRecord, now: Instant) -> Vec<UiCommand> {
        if !self.gate.try_accept(now) {
            log::debug!("RowInteractions: tap on {} ignored inside quiet window", record.title_id);
            return Vec::new();
        }
        if let Some(stale) = self.stale_file_commands(record) {
            return stale;
        }
        vec![
            UiCommand::RecordLastPlayed {
                key: record.last_played_key(),
                at_millis: wall_clock_millis(),
            },
            UiCommand::Launch {
                record: record.clone(),
                custom_settings: false,
            },
        ]
    }

    /// Long press on a row: open its properties. Not subject to the gate.
    pub fn on_long_press(&self, record: &GameRecord) -> Vec<UiCommand> {
        if let Some(stale) = self.stale_file_commands(record) {
            return stale;
        }
        if record.title_id.is_unknown() {
            return vec![UiCommand::ShowNotice { notice: Notice::PropertiesNotLoaded }];
        }
        vec![UiCommand::ShowProperties(record.clone())]
    }

    pub fn properties_action(&self, record: &GameRecord, action: PropertiesAction) -> Vec<UiCommand> {
        let command = match action {
            PropertiesAction::LaunchGlobalConfig | PropertiesAction::LaunchCustomConfig => UiCommand::Launch {
                record: record.clone(),
                custom_settings: action == PropertiesAction::LaunchCustomConfig,
            },
            PropertiesAction::OpenSettings => UiCommand::OpenSettings {
                scope: record.formatted_title_id(),
            },
            PropertiesAction::OpenCheats => UiCommand::OpenCheats {
                title_id: record.title_id,
            },
            PropertiesAction::PinShortcut => UiCommand::PinShortcut {
                label: record.title.clone(),
                record: record.clone(),
            },
        };
        vec![command]
    }

    /// Resident titles are trusted; anything else is probed.
    fn stale_file_commands(&self, record: &GameRecord) -> Option<Vec<UiCommand>> {
        if record.is_resident || self.storage.exists(&record.locator) {
            return None;
        }
        log::info!("RowInteractions: '{}' is gone, refreshing library", record.locator);
        Some(vec![
            UiCommand::ShowNotice { notice: Notice::FileNotFound },
            UiCommand::RefreshLibrary,
        ])
    }
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
