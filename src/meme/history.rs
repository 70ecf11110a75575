use crate::error::{StorageError, ValidationError};
use crate::meme::model::{Alignment, Color, TextBox};
use crate::meme::storage::StoragePort;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage key owning the whole serialized history.
pub const HISTORY_KEY: &str = "meme_history";
pub const DEFAULT_CAPACITY: usize = 10;

/// One finalized composition: compressed image plus a frozen copy of its
/// text boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub image_url: String,
    pub text_boxes: Vec<TextBox>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SaveOutcome {
    Persisted,
    /// The full list did not fit; only the new entry was kept.
    PersistedSingle { dropped: usize },
    /// Nothing was written; the previous list is unchanged.
    NotPersisted { error: StorageError },
    Rejected { reason: ValidationError },
}

impl SaveOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            SaveOutcome::Persisted | SaveOutcome::PersistedSingle { .. }
        )
    }
}

/// Result of [`HistoryStore::save`]: the best achievable list plus how it was
/// reached.
#[derive(Debug)]
pub struct HistorySave {
    pub entries: Vec<HistoryEntry>,
    pub outcome: SaveOutcome,
}

/// Bounded, most-recent-first history over a single storage key.
pub struct HistoryStore<S: StoragePort> {
    storage: S,
    key: String,
    capacity: usize,
    entries: Vec<HistoryEntry>,
}

impl<S: StoragePort> HistoryStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key: HISTORY_KEY.to_string(),
            capacity: DEFAULT_CAPACITY,
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// View from the last load, save or clear.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Read the persisted list. Missing or corrupted data yields an empty
    /// list; malformed entries are dropped one by one.
    pub fn load(&mut self) -> Vec<HistoryEntry> {
        self.entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(key = %self.key, "failed to read history: {e}");
                Vec::new()
            }
        };
        self.entries.clone()
    }

    /// Absent or corrupted data is an empty list; only a failed read is an
    /// error, since the stored list may still be intact.
    fn read_entries(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let raw = match self.storage.read(&self.key)? {
            Some(raw) => raw,
            None => {
                tracing::debug!(key = %self.key, "no history stored");
                return Ok(Vec::new());
            }
        };

        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %self.key, "history is not valid JSON, ignoring it: {e}");
                return Ok(Vec::new());
            }
        };

        let entries = match validate_history(&parsed) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(key = %self.key, "history is corrupted, ignoring it: {e}");
                return Ok(Vec::new());
            }
        };

        tracing::debug!(valid = entries.len(), "loaded history");
        Ok(entries)
    }

    /// Prepend a new entry and persist, keeping at most `capacity` entries.
    /// Never fails: when the full list cannot be stored, only the new entry
    /// is stored; when even that fails, the previous list is returned.
    /// If the stored list cannot be read, nothing is written so it is not
    /// overwritten.
    pub fn save(&mut self, image_url: &str, text_boxes: &[TextBox]) -> HistorySave {
        let previous = match self.read_entries() {
            Ok(entries) => entries,
            Err(error) => {
                tracing::error!(key = %self.key, "failed to read history, not saving: {error}");
                return HistorySave {
                    entries: self.entries.clone(),
                    outcome: SaveOutcome::NotPersisted { error },
                };
            }
        };
        self.entries = previous.clone();

        if image_url.is_empty() {
            return HistorySave {
                entries: previous,
                outcome: SaveOutcome::Rejected {
                    reason: ValidationError::Field("imageUrl"),
                },
            };
        }

        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            image_url: image_url.to_string(),
            text_boxes: text_boxes.to_vec(),
            created_at: Utc::now(),
        };

        let mut updated = Vec::with_capacity(previous.len() + 1);
        updated.push(entry.clone());
        updated.extend(previous.iter().cloned());
        updated.truncate(self.capacity);

        match self.persist(&updated) {
            Ok(()) => {
                tracing::info!(total = updated.len(), "saved meme to history");
                self.entries = updated.clone();
                HistorySave {
                    entries: updated,
                    outcome: SaveOutcome::Persisted,
                }
            }
            Err(e) => {
                tracing::warn!("history write failed, retrying with only the new entry: {e}");
                let single = vec![entry];
                match self.persist(&single) {
                    Ok(()) => {
                        let dropped = updated.len() - 1;
                        tracing::info!(dropped, "saved single entry to history");
                        self.entries = single.clone();
                        HistorySave {
                            entries: single,
                            outcome: SaveOutcome::PersistedSingle { dropped },
                        }
                    }
                    Err(error) => {
                        tracing::error!("history write failed again, keeping previous list: {error}");
                        self.entries = previous.clone();
                        HistorySave {
                            entries: previous,
                            outcome: SaveOutcome::NotPersisted { error },
                        }
                    }
                }
            }
        }
    }

    /// Remove the persisted list. Safe to call on an empty store.
    pub fn clear(&mut self) -> Vec<HistoryEntry> {
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::error!(key = %self.key, "failed to clear history: {e}");
        } else {
            tracing::info!("history cleared");
        }
        self.entries.clear();
        Vec::new()
    }

    fn persist(&mut self, entries: &[HistoryEntry]) -> Result<(), StorageError> {
        let json =
            serde_json::to_string(entries).map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.storage.write(&self.key, &json)
    }
}

/// Validate a raw history blob. Only a non-list is fatal; invalid entries are
/// dropped individually.
pub fn validate_history(value: &Value) -> Result<Vec<HistoryEntry>, ValidationError> {
    let items = value.as_array().ok_or(ValidationError::NotAList)?;
    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match validate_entry(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(index = i, "dropping invalid history entry: {e}");
                None
            }
        })
        .collect())
}

pub fn validate_entry(value: &Value) -> Result<HistoryEntry, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let non_empty_str = |field: &'static str| {
        obj.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ValidationError::Field(field))
    };
    let id = non_empty_str("id")?;
    let image_url = non_empty_str("imageUrl")?;

    let text_boxes = obj
        .get("textBoxes")
        .and_then(Value::as_array)
        .ok_or(ValidationError::Field("textBoxes"))?
        .iter()
        .enumerate()
        .map(|(index, b)| text_box_from_value(index, b))
        .collect::<Result<Vec<_>, _>>()?;

    let created_at = obj
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();

    Ok(HistoryEntry {
        id,
        image_url,
        text_boxes,
        created_at,
    })
}

/// Required: string `id` and `text`, numeric `x` and `y`. Style fields fall
/// back to defaults when absent or unreadable.
fn text_box_from_value(index: usize, value: &Value) -> Result<TextBox, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::TextBox {
        index,
        field: "object",
    })?;
    let string = |field: &'static str| {
        obj.get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ValidationError::TextBox { index, field })
    };
    let number = |field: &'static str| {
        obj.get(field)
            .and_then(Value::as_f64)
            .ok_or(ValidationError::TextBox { index, field })
    };

    let mut text_box = TextBox {
        id: string("id")?,
        text: string("text")?,
        x: number("x")?,
        y: number("y")?,
        ..TextBox::new()
    };

    if let Some(size) = obj.get("size").and_then(Value::as_f64) {
        text_box.size = size;
    }
    if let Some(width) = obj.get("outlineWidth").and_then(Value::as_f64) {
        text_box.outline_width = width;
    }
    if let Some(color) = color_field(obj.get("fontColor")) {
        text_box.font_color = color;
    }
    if let Some(color) = color_field(obj.get("outlineColor")) {
        text_box.outline_color = color;
    }
    if let Some(alignment) = obj
        .get("alignment")
        .and_then(|v| serde_json::from_value::<Alignment>(v.clone()).ok())
    {
        text_box.alignment = alignment;
    }
    Ok(text_box)
}

fn color_field(value: Option<&Value>) -> Option<Color> {
    value.and_then(Value::as_str).and_then(|s| s.parse().ok())
}
