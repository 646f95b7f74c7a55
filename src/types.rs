//! Game records and the edit scripts that transform one list snapshot into the next
use crate::errors::{ReconcilerError, check_position};
use phf::phf_set;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extensions the emulator cannot boot directly; rows for these get flagged.
static UNSUPPORTED_EXTENSIONS: phf::Set<&'static str> = phf_set! {
    "rar",
    "zip",
    "7z",
    "torrent",
    "tar",
    "gz",
};

/// Stable, content-independent identifier of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(pub u64);

impl TitleId {
    /// Reserved for records whose metadata could not be read.
    pub const UNKNOWN: TitleId = TitleId(0);

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

/// One playable entry of the game library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameRecord {
    pub title_id: TitleId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub regions: String,
    /// Path or URI of the backing file. Not guaranteed to still exist.
    pub locator: String,
    /// True when the title is installed locally rather than referenced externally.
    #[serde(default)]
    pub is_resident: bool,
}

impl GameRecord {
    pub fn new(title_id: u64, title: impl Into<String>, locator: impl Into<String>) -> Self {
        GameRecord {
            title_id: TitleId(title_id),
            title: title.into(),
            locator: locator.into(),
            ..Default::default()
        }
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = publisher.into();
        self
    }

    pub fn with_regions(mut self, regions: impl Into<String>) -> Self {
        self.regions = regions.into();
        self
    }

    pub fn resident(mut self) -> Self {
        self.is_resident = true;
        self
    }

    /// Last segment of the locator. Document-provider URIs encode their
    /// separators, so `%2F` counts as one too.
    pub fn filename(&self) -> &str {
        let tail = self.locator.rsplit('/').next().unwrap_or(&self.locator);
        match tail.rfind("%2F").or_else(|| tail.rfind("%2f")) {
            Some(idx) => &tail[idx + 3..],
            None => tail,
        }
    }

    /// Lower-cased text after the last `.` of the filename, or the whole
    /// filename when it has no dot.
    pub fn file_extension(&self) -> String {
        let name = self.filename();
        let ext = match name.rfind('.') {
            Some(idx) => &name[idx + 1..],
            None => name,
        };
        ext.to_lowercase()
    }

    pub fn has_supported_extension(&self) -> bool {
        !UNSUPPORTED_EXTENSIONS.contains(self.file_extension().as_str())
    }

    /// Scope string for per-game settings, 16 upper-case hex digits.
    pub fn formatted_title_id(&self) -> String {
        self.title_id.to_string()
    }

    /// Preference key under which the last-played timestamp is recorded.
    pub fn last_played_key(&self) -> String {
        format!("{}_LastPlayed", self.filename())
    }
}

/// A single structural edit. Positions refer to the list as it stands when the
/// op is replayed, after all earlier ops of the same script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditOp<T> {
    Insert { position: usize, record: T },
    Remove { position: usize },
    /// Take the row at `from` out, then reinsert it at `to` of the shortened list.
    Move { from: usize, to: usize },
    Update { position: usize, record: T },
}

impl<T> EditOp<T> {
    pub fn name(&self) -> &'static str {
        match self {
            EditOp::Insert { .. } => "INSERT",
            EditOp::Remove { .. } => "REMOVE",
            EditOp::Move { .. } => "MOVE",
            EditOp::Update { .. } => "UPDATE",
        }
    }
}

/// Ordered edit ops, consumed once by a presentation surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EditScript<T> {
    ops: Vec<EditOp<T>>,
}

impl<T> Default for EditScript<T> {
    fn default() -> Self {
        EditScript { ops: Vec::new() }
    }
}

impl<T> EditScript<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, op: EditOp<T>) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[EditOp<T>] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EditOp<T>> {
        self.ops.iter()
    }

    pub fn inserts(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Insert { .. }))
    }

    pub fn removes(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Remove { .. }))
    }

    pub fn moves(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Move { .. }))
    }

    pub fn updates(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Update { .. }))
    }

    fn count(&self, pred: impl Fn(&EditOp<T>) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }
}

impl<T: Clone> EditScript<T> {
    /// Replays the script against `rows`. Stops at the first op whose position
    /// does not fit; rows edited before that point stay edited.
    pub fn apply_to(&self, rows: &mut Vec<T>) -> Result<(), ReconcilerError> {
        for op in &self.ops {
            match op {
                EditOp::Insert { position, record } => {
                    check_position(op.name(), *position, rows.len() + 1)?;
                    rows.insert(*position, record.clone());
                }
                EditOp::Remove { position } => {
                    check_position(op.name(), *position, rows.len())?;
                    rows.remove(*position);
                }
                EditOp::Move { from, to } => {
                    check_position(op.name(), *from, rows.len())?;
                    check_position(op.name(), *to, rows.len())?;
                    let row = rows.remove(*from);
                    rows.insert(*to, row);
                }
                EditOp::Update { position, record } => {
                    check_position(op.name(), *position, rows.len())?;
                    rows[*position] = record.clone();
                }
            }
        }
        Ok(())
    }
}

impl<'a, T> IntoIterator for &'a EditScript<T> {
    type Item = &'a EditOp<T>;
    type IntoIter = std::slice::Iter<'a, EditOp<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
