//! Typed setting lookups against an external configuration store.
//!
//! Resolution is total: a key the store does not know, or holds with the
//! wrong type, resolves to the kind's zero value.
use crate::config::{DEFAULT_SETTINGS, scale_for};
use crate::converters::{json_to_setting, parse_settings_object, setting_to_json};
use crate::errors::ReconcilerError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    Boolean,
    Integer,
    /// Stored in UI units and divided by the key's scale on read.
    ScaledFloat,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i32),
    ScaledFloat(f32),
    String(String),
}

impl SettingValue {
    pub fn zero(kind: SettingKind) -> Self {
        match kind {
            SettingKind::Boolean => SettingValue::Boolean(false),
            SettingKind::Integer => SettingValue::Integer(0),
            SettingKind::ScaledFloat => SettingValue::ScaledFloat(0.0),
            SettingKind::String => SettingValue::String(String::new()),
        }
    }

    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Boolean(_) => SettingKind::Boolean,
            SettingValue::Integer(_) => SettingKind::Integer,
            SettingValue::ScaledFloat(_) => SettingKind::ScaledFloat,
            SettingValue::String(_) => SettingKind::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            SettingValue::ScaledFloat(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// The native configuration store, reduced to one typed read.
pub trait SettingStore: Send + Sync {
    /// The raw stored value for `key` read as `kind`, or `None` if absent or
    /// not representable as `kind`.
    fn lookup(&self, key: &str, kind: SettingKind) -> Option<SettingValue>;
}

/// In-memory store backed by a JSON object.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingStore {
    values: IndexMap<String, serde_json::Value>,
}

impl MemorySettingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with the bundled defaults.
    pub fn with_defaults() -> Self {
        MemorySettingStore {
            values: DEFAULT_SETTINGS.clone(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ReconcilerError> {
        Ok(MemorySettingStore {
            values: parse_settings_object(text)?,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReconcilerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ReconcilerError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_json_str(&text)?;
        log::info!("Loaded {} settings from {}", store.len(), path.display());
        Ok(store)
    }

    /// Overlays every key of `text` onto this store.
    pub fn merge_json_str(&mut self, text: &str) -> Result<(), ReconcilerError> {
        self.values.extend(parse_settings_object(text)?);
        Ok(())
    }

    pub fn set(&mut self, key: impl Into<String>, value: SettingValue) {
        self.values.insert(key.into(), setting_to_json(&value));
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.shift_remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl SettingStore for MemorySettingStore {
    fn lookup(&self, key: &str, kind: SettingKind) -> Option<SettingValue> {
        let raw = self.values.get(key)?;
        let value = json_to_setting(raw, kind);
        if value.is_none() {
            log::warn!("Setting '{key}' holds {raw}, which is not a valid {kind:?}");
        }
        value
    }
}

/// Explicit handle to the configuration store, shared by whoever needs
/// typed settings.
#[derive(Clone)]
pub struct SettingResolver {
    store: Arc<dyn SettingStore>,
}

impl std::fmt::Debug for SettingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettingResolver(<store>)")
    }
}

impl SettingResolver {
    pub fn new(store: Arc<dyn SettingStore>) -> Self {
        SettingResolver { store }
    }

    pub fn from_store(store: impl SettingStore + 'static) -> Self {
        Self::new(Arc::new(store))
    }

    /// Like `resolve`, but keeps "absent" distinguishable from a zero value.
    pub fn lookup(&self, key: &str, kind: SettingKind) -> Option<SettingValue> {
        let value = self.store.lookup(key, kind)?;
        match value {
            SettingValue::ScaledFloat(raw) => Some(SettingValue::ScaledFloat(raw / scale_for(key))),
            other => Some(other),
        }
    }

    pub fn resolve(&self, key: &str, kind: SettingKind) -> SettingValue {
        self.lookup(key, kind).unwrap_or_else(|| {
            log::debug!("Setting '{key}' unresolved, using {kind:?} default");
            SettingValue::zero(kind)
        })
    }

    pub fn boolean(&self, key: &str) -> bool {
        self.resolve(key, SettingKind::Boolean).as_bool().unwrap_or(false)
    }

    pub fn integer(&self, key: &str) -> i32 {
        self.resolve(key, SettingKind::Integer).as_int().unwrap_or(0)
    }

    pub fn scaled_float(&self, key: &str) -> f32 {
        self.resolve(key, SettingKind::ScaledFloat).as_float().unwrap_or(0.0)
    }

    pub fn string(&self, key: &str) -> String {
        match self.resolve(key, SettingKind::String) {
            SettingValue::String(s) => s,
            _ => String::new(),
        }
    }
}
