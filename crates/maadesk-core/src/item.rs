//! Typed, validated config item store.
//!
//! A [`Document`] is a flat set of `(group, key)` addressed items with
//! compiled-in defaults. On disk it is a JSON object whose top-level keys
//! are group names; each group maps to either a scalar (ungrouped item,
//! empty key) or an object of key→scalar pairs. Unknown keys are ignored
//! on load, missing keys fall back to the default and are written back on
//! the next save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Identity of a config item inside one document: `group.key`.
/// An empty key means the item is the entire group's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    pub group: &'static str,
    pub key: &'static str,
}

impl ItemId {
    pub const fn new(group: &'static str, key: &'static str) -> Self {
        Self { group, key }
    }

    fn storage_key(&self) -> String {
        if self.key.is_empty() {
            self.group.to_string()
        } else {
            format!("{}.{}", self.group, self.key)
        }
    }
}

/// Validation rule attached to an item. `correct` runs before `validate`;
/// a value is committed only when `validate` passes afterwards.
#[derive(Debug, Clone)]
pub enum Validator {
    None,
    Bool,
    /// Numeric interval, inclusive. `correct` clamps.
    Range { min: i64, max: i64 },
    /// Enumerated value set. `correct` falls back to the default.
    Options(Vec<Value>),
    /// Existing directory; corrected to an absolute `/`-separated path.
    Folder,
    /// Existing file; same correction as `Folder`.
    File,
    /// List of URLs: trailing slash normalized, non-URLs dropped, deduped.
    UrlList,
}

impl Validator {
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            Validator::None => true,
            Validator::Bool => value.is_boolean(),
            Validator::Range { min, max } => value
                .as_i64()
                .is_some_and(|n| (*min..=*max).contains(&n)),
            Validator::Options(options) => options.contains(value),
            Validator::Folder => value
                .as_str()
                .is_some_and(|s| Path::new(s).is_dir()),
            Validator::File => value
                .as_str()
                .is_some_and(|s| Path::new(s).is_file()),
            Validator::UrlList => value
                .as_array()
                .is_some_and(|urls| urls.iter().all(is_url)),
        }
    }

    pub fn correct(&self, value: Value, default: &Value) -> Value {
        match self {
            Validator::None | Validator::Bool => value,
            Validator::Range { min, max } => match value.as_i64() {
                Some(n) => Value::from(n.clamp(*min, *max)),
                None => default.clone(),
            },
            Validator::Options(options) => {
                if options.contains(&value) {
                    value
                } else {
                    default.clone()
                }
            }
            Validator::Folder | Validator::File => match value.as_str() {
                Some(s) => Value::from(normalize_path(s)),
                None => default.clone(),
            },
            Validator::UrlList => {
                let mut urls: Vec<Value> = Vec::new();
                for url in value.as_array().map(|a| a.as_slice()).unwrap_or(&[]) {
                    let Some(s) = url.as_str().filter(|s| !s.is_empty()) else {
                        continue;
                    };
                    let normalized = if s.ends_with('/') {
                        s.to_string()
                    } else {
                        format!("{s}/")
                    };
                    let candidate = Value::from(normalized);
                    if is_url(&candidate) && !urls.contains(&candidate) {
                        urls.push(candidate);
                    }
                }
                Value::Array(urls)
            }
        }
    }
}

fn is_url(value: &Value) -> bool {
    value.as_str().is_some_and(|s| {
        s.split_once("://")
            .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
    })
}

/// Absolute path with forward slashes, matching the on-disk convention.
fn normalize_path(s: &str) -> String {
    let path = Path::new(s);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    absolute.to_string_lossy().replace('\\', "/")
}

/// One declared item of a document schema.
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub id: ItemId,
    pub default: Value,
    pub validator: Validator,
}

impl ItemSpec {
    pub fn new(id: ItemId, default: impl Into<Value>) -> Self {
        Self {
            id,
            default: default.into(),
            validator: Validator::None,
        }
    }

    pub fn with(id: ItemId, default: impl Into<Value>, validator: Validator) -> Self {
        Self {
            id,
            default: default.into(),
            validator,
        }
    }
}

/// A config document: schema plus current values, optionally bound to a
/// JSON file. `set` persists immediately when bound; `save` always fully
/// rewrites the file.
#[derive(Debug)]
pub struct Document {
    specs: Vec<ItemSpec>,
    values: HashMap<String, Value>,
    path: Option<PathBuf>,
}

impl Document {
    /// Build a document from its schema registration list, all defaults.
    pub fn new(specs: Vec<ItemSpec>) -> Self {
        let values = specs
            .iter()
            .map(|spec| (spec.id.storage_key(), spec.default.clone()))
            .collect();
        Self {
            specs,
            values,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn spec(&self, id: ItemId) -> Option<&ItemSpec> {
        self.specs.iter().find(|spec| spec.id == id)
    }

    /// Current value of an item (`Null` when the id is not in the schema).
    pub fn get(&self, id: ItemId) -> Value {
        self.values
            .get(&id.storage_key())
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn get_str(&self, id: ItemId) -> String {
        self.get(id).as_str().unwrap_or_default().to_string()
    }

    pub fn get_bool(&self, id: ItemId) -> bool {
        self.get(id).as_bool().unwrap_or(false)
    }

    pub fn get_int(&self, id: ItemId) -> i64 {
        self.get(id).as_i64().unwrap_or(0)
    }

    /// Correct, validate, and commit a value. Returns false when the
    /// validator rejects it or the stored value is unchanged. A committed
    /// change is persisted immediately when the document is file-bound.
    pub fn set(&mut self, id: ItemId, value: impl Into<Value>) -> bool {
        let Some(spec) = self.spec(id) else {
            tracing::warn!("unknown config item: {}.{}", id.group, id.key);
            return false;
        };
        let value = spec.validator.correct(value.into(), &spec.default);
        if !spec.validator.validate(&value) {
            return false;
        }
        let key = id.storage_key();
        if self.values.get(&key) == Some(&value) {
            return false;
        }
        self.values.insert(key, value);
        self.save();
        true
    }

    fn assign(&mut self, idx: usize, value: Value) {
        let spec = &self.specs[idx];
        let value = spec.validator.correct(value, &spec.default);
        if spec.validator.validate(&value) {
            self.values.insert(spec.id.storage_key(), value);
        }
    }

    /// Bind to `path` and load values from it, best effort: a missing or
    /// corrupt file leaves every item at its default.
    pub fn load(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        let parsed = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok());
        self.path = Some(path);
        let Some(Value::Object(groups)) = parsed else {
            return;
        };
        for idx in 0..self.specs.len() {
            let id = self.specs[idx].id;
            let found = if id.key.is_empty() {
                groups.get(id.group).filter(|v| !v.is_object()).cloned()
            } else {
                groups
                    .get(id.group)
                    .and_then(|g| g.get(id.key))
                    .cloned()
            };
            if let Some(value) = found {
                self.assign(idx, value);
            }
        }
    }

    /// Full rewrite of the bound file. Unbound documents are skipped.
    pub fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("failed to create {}: {e}", parent.display());
                return;
            }
        }
        let text = match serde_json::to_string_pretty(&Value::Object(self.to_map())) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("failed to serialize {}: {e}", path.display());
                return;
            }
        };
        if let Err(e) = std::fs::write(path, text) {
            tracing::warn!("failed to write {}: {e}", path.display());
        }
    }

    /// Nested mapping: group → scalar (ungrouped) or key→value object.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut groups: Map<String, Value> = Map::new();
        for spec in &self.specs {
            let value = self.get(spec.id);
            if spec.id.key.is_empty() {
                groups.insert(spec.id.group.to_string(), value);
            } else {
                let entry = groups
                    .entry(spec.id.group.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map) = entry {
                    map.insert(spec.id.key.to_string(), value);
                }
            }
        }
        groups
    }
}
