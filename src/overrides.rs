use crate::error::{CrawlError, Result};
use crate::normalizer::normalize_name;
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Players whose pid cannot be guessed from the roster name: nicknames,
/// compound surnames, apostrophes, family-name-first romanizations.
const BUNDLED: &str = include_str!("../overrides.json");

#[derive(Debug, Deserialize)]
struct OverrideEntry {
    first: String,
    last: String,
    pid: String,
}

/// Known-correct pids keyed by the normalized (first, last) pair.
#[derive(Debug, Default, Clone)]
pub struct OverrideTable {
    entries: HashMap<(String, String), String>,
}

impl OverrideTable {
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED).map_err(|e| CrawlError::Config(format!("bundled overrides: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| CrawlError::Config(format!("cannot read overrides {}: {e}", path.display())))?;
        let table = Self::from_json(&text)
            .map_err(|e| CrawlError::Config(format!("cannot parse overrides {}: {e}", path.display())))?;
        info!("Loaded {} name overrides from {}", table.len(), path.display());
        Ok(table)
    }

    fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        let raw: Vec<OverrideEntry> = serde_json::from_str(text)?;
        let mut table = OverrideTable::default();
        for entry in raw {
            table.insert(&entry.first, &entry.last, entry.pid.trim());
        }
        Ok(table)
    }

    /// Keys are normalized here, so entries may use the natural spelling.
    pub fn insert(&mut self, first: &str, last: &str, pid: &str) {
        self.entries
            .insert((normalize_name(first), normalize_name(last)), pid.to_string());
    }

    /// Look up an already-normalized pair.
    pub fn lookup(&self, first: &str, last: &str) -> Option<&str> {
        self.entries
            .get(&(first.to_string(), last.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
