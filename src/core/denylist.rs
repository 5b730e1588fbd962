//! Denylist store
//!
//! Blocked token and developer addresses, persisted as
//! `{"tokens": [...], "developers": [...]}`. Entries are lower-cased.
//!
//! Readers take an `Arc` snapshot and never see a half-applied update.
//! Writers are serialized; each update clones the current set, mutates the
//! clone, persists it via temp file + rename, then swaps the shared `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

use crate::models::{AppError, AppResult, ErrorCode, Token};
use crate::utils::atomic::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denylist {
    #[serde(default)]
    pub tokens: BTreeSet<String>,
    #[serde(default)]
    pub developers: BTreeSet<String>,
}

impl Denylist {
    pub fn contains_token(&self, address: &str) -> bool {
        self.tokens.contains(&address.trim().to_lowercase())
    }

    pub fn contains_developer(&self, address: &str) -> bool {
        self.developers.contains(&address.trim().to_lowercase())
    }

    /// Token address or developer address is listed
    pub fn matches(&self, token: &Token) -> bool {
        self.contains_token(&token.address)
            || token
                .developer_address
                .as_deref()
                .map(|dev| self.contains_developer(dev))
                .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tokens.len() + self.developers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.developers.is_empty()
    }

    /// Canonical entries plus how many unusable ones were dropped
    fn normalized(self) -> (Self, usize) {
        let mut dropped = 0;
        let mut keep = |set: BTreeSet<String>| -> BTreeSet<String> {
            set.into_iter()
                .filter_map(|a| match normalize_address(&a) {
                    Ok(address) => Some(address),
                    Err(e) => {
                        warn!("⚠️ Skipping denylist entry: {}", e.message);
                        dropped += 1;
                        None
                    }
                })
                .collect()
        };
        let normalized = Self {
            tokens: keep(self.tokens),
            developers: keep(self.developers),
        };
        (normalized, dropped)
    }
}

/// Trimmed, lower-cased address; empty input is rejected
pub fn normalize_address(address: &str) -> AppResult<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_address("Address must not be empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(AppError::invalid_address(format!("Address '{}' contains whitespace", trimmed)));
    }
    Ok(trimmed.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenylistKind {
    Token,
    Developer,
}

impl DenylistKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenylistKind::Token => "token",
            DenylistKind::Developer => "developer",
        }
    }
}

#[derive(Debug)]
pub struct DenylistStore {
    /// None keeps the list in memory only
    path: Option<PathBuf>,
    current: RwLock<Arc<Denylist>>,
    writer: Mutex<()>,
}

impl DenylistStore {
    /// Load from `path`. A missing file is an empty denylist;
    /// a malformed one is a fatal configuration error.
    pub fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let denylist = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| {
                AppError::with_source(
                    ErrorCode::DenylistIo,
                    format!("Cannot read denylist '{}'", path.display()),
                    e,
                )
            })?;
            let parsed: Denylist = serde_json::from_str(&raw).map_err(|e| {
                AppError::with_source(
                    ErrorCode::DenylistMalformed,
                    format!("Denylist '{}' is malformed: {}", path.display(), e),
                    e,
                )
            })?;
            let (denylist, dropped) = parsed.normalized();
            if dropped > 0 {
                warn!("⚠️ Denylist '{}' has {} invalid entries; fix or remove them", path.display(), dropped);
            }
            denylist
        } else {
            warn!("📭 Denylist '{}' not found, starting empty", path.display());
            Denylist::default()
        };

        info!(
            "🚫 Denylist loaded: {} tokens, {} developers",
            denylist.tokens.len(),
            denylist.developers.len()
        );

        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(denylist)),
            writer: Mutex::new(()),
        })
    }

    pub fn in_memory(denylist: Denylist) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(denylist.normalized().0)),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Consistent view for one run or one request
    pub fn snapshot(&self) -> Arc<Denylist> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn contains_token(&self, address: &str) -> bool {
        self.snapshot().contains_token(address)
    }

    pub fn contains_developer(&self, address: &str) -> bool {
        self.snapshot().contains_developer(address)
    }

    /// Returns true when the entry was added; false when already present
    pub fn add_token(&self, address: &str) -> AppResult<bool> {
        self.insert(DenylistKind::Token, address)
    }

    pub fn add_developer(&self, address: &str) -> AppResult<bool> {
        self.insert(DenylistKind::Developer, address)
    }

    /// Returns true when the entry was removed; false when absent
    pub fn remove_token(&self, address: &str) -> AppResult<bool> {
        self.delete(DenylistKind::Token, address)
    }

    pub fn remove_developer(&self, address: &str) -> AppResult<bool> {
        self.delete(DenylistKind::Developer, address)
    }

    pub fn insert(&self, kind: DenylistKind, address: &str) -> AppResult<bool> {
        let address = normalize_address(address)?;
        let changed = self.update(|list| set_of(list, kind).insert(address.clone()))?;
        if changed {
            info!("🚫 Denylisted {} {}", kind.as_str(), address);
        }
        Ok(changed)
    }

    pub fn delete(&self, kind: DenylistKind, address: &str) -> AppResult<bool> {
        let address = normalize_address(address)?;
        let changed = self.update(|list| set_of(list, kind).remove(&address))?;
        if changed {
            info!("✅ Removed {} {} from denylist", kind.as_str(), address);
        }
        Ok(changed)
    }

    /// Add several entries as one update; returns how many were new
    pub fn add_many(&self, tokens: &[String], developers: &[String]) -> AppResult<usize> {
        let tokens: Vec<String> = tokens.iter().filter_map(|a| normalize_address(a).ok()).collect();
        let developers: Vec<String> = developers.iter().filter_map(|a| normalize_address(a).ok()).collect();

        let mut added = 0;
        self.update(|list| {
            for t in &tokens {
                if list.tokens.insert(t.clone()) {
                    added += 1;
                }
            }
            for d in &developers {
                if list.developers.insert(d.clone()) {
                    added += 1;
                }
            }
            added > 0
        })?;
        Ok(added)
    }

    /// clone → mutate → persist → swap, serialized by the writer lock.
    /// `mutate` returns whether anything changed; unchanged sets are not written.
    fn update<F>(&self, mutate: F) -> AppResult<bool>
    where
        F: FnOnce(&mut Denylist) -> bool,
    {
        let _writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut next = (*self.snapshot()).clone();
        if !mutate(&mut next) {
            return Ok(false);
        }

        if let Some(path) = &self.path {
            persist(path, &next)?;
        }

        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        Ok(true)
    }
}

fn set_of(list: &mut Denylist, kind: DenylistKind) -> &mut BTreeSet<String> {
    match kind {
        DenylistKind::Token => &mut list.tokens,
        DenylistKind::Developer => &mut list.developers,
    }
}

fn persist(path: &Path, denylist: &Denylist) -> AppResult<()> {
    let mut json = serde_json::to_vec_pretty(denylist)
        .map_err(|e| AppError::with_source(ErrorCode::DenylistIo, "Cannot serialize denylist", e))?;
    json.push(b'\n');
    write_atomic(path, &json).map_err(|e| {
        AppError::with_source(
            ErrorCode::DenylistIo,
            format!("Cannot write denylist '{}'", path.display()),
            e,
        )
    })
}
