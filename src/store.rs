//! Local key-value store for per-user state that never goes to GitHub:
//! lesson notes, sketches and the saved GitHub settings.
//!
//! `FileStore` keeps the whole map in memory and rewrites one JSON file on
//! every change (temp file + rename). An optional byte quota bounds the file.
//! `update` is the read-modify-write primitive; concurrent writers to the same
//! key go through it so neither overwrites the other with a stale copy.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::Mutex,
};

use tracing::{debug, info, instrument};

use crate::error::StoreError;

pub trait KvStore: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
  fn remove(&self, key: &str) -> Result<(), StoreError>;
  /// Read-modify-write of one key under the store's lock. `f` sees the current
  /// value; returning `None` removes the key.
  fn update(&self, key: &str, f: &mut dyn FnMut(Option<&str>) -> Option<String>) -> Result<(), StoreError>;
}

fn apply_edit(map: &mut BTreeMap<String, String>, key: &str, f: &mut dyn FnMut(Option<&str>) -> Option<String>) {
  match f(map.get(key).map(String::as_str)) {
    Some(v) => {
      map.insert(key.to_string(), v);
    }
    None => {
      map.remove(key);
    }
  }
}

/// Bytes the map occupies once serialized, as the quota sees it.
fn footprint(map: &BTreeMap<String, String>) -> usize {
  map.iter().map(|(k, v)| k.len() + v.len()).sum()
}

fn check_quota(map: &BTreeMap<String, String>, quota: Option<usize>) -> Result<(), StoreError> {
  match quota {
    Some(quota) => {
      let needed = footprint(map);
      if needed > quota {
        return Err(StoreError::QuotaExceeded { needed, quota });
      }
      Ok(())
    }
    None => Ok(()),
  }
}

pub struct FileStore {
  path: PathBuf,
  quota: Option<usize>,
  map: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
  /// Open (or start) the store at `path`. A missing file is an empty store.
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub fn open(path: impl AsRef<Path>, quota: Option<usize>) -> Result<Self, StoreError> {
    let path = path.as_ref().to_path_buf();
    let map = match std::fs::read_to_string(&path) {
      Ok(s) if s.trim().is_empty() => BTreeMap::new(),
      Ok(s) => serde_json::from_str(&s)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(e.into()),
    };
    info!(target: "planner_backend", entries = map.len(), ?quota, "Opened local store");
    Ok(Self { path, quota, map: Mutex::new(map) })
  }

  fn persist(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
    std::fs::rename(&tmp, &self.path)?;
    Ok(())
  }

  /// Apply `edit` to a copy of the map, check quota, write, then swap in.
  fn apply(&self, edit: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StoreError> {
    let mut guard = self.map.lock().unwrap_or_else(|e| e.into_inner());
    let mut next = guard.clone();
    edit(&mut next);
    check_quota(&next, self.quota)?;
    self.persist(&next)?;
    *guard = next;
    Ok(())
  }
}

impl KvStore for FileStore {
  fn get(&self, key: &str) -> Option<String> {
    self.map.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    debug!(target: "planner_backend", %key, bytes = value.len(), "store set");
    self.apply(|m| {
      m.insert(key.to_string(), value.to_string());
    })
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    debug!(target: "planner_backend", %key, "store remove");
    self.apply(|m| {
      m.remove(key);
    })
  }

  fn update(&self, key: &str, f: &mut dyn FnMut(Option<&str>) -> Option<String>) -> Result<(), StoreError> {
    debug!(target: "planner_backend", %key, "store update");
    self.apply(|m| apply_edit(m, key, f))
  }
}

/// In-memory store, used when no store path is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
  quota: Option<usize>,
  map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
  pub fn with_quota(quota: Option<usize>) -> Self {
    Self { quota, map: Mutex::default() }
  }
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    self.map.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let mut guard = self.map.lock().unwrap_or_else(|e| e.into_inner());
    let mut next = guard.clone();
    next.insert(key.to_string(), value.to_string());
    check_quota(&next, self.quota)?;
    *guard = next;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    self.map.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
    Ok(())
  }

  fn update(&self, key: &str, f: &mut dyn FnMut(Option<&str>) -> Option<String>) -> Result<(), StoreError> {
    let mut guard = self.map.lock().unwrap_or_else(|e| e.into_inner());
    let mut next = guard.clone();
    apply_edit(&mut next, key, f);
    check_quota(&next, self.quota)?;
    *guard = next;
    Ok(())
  }
}
