//! Per-station event and command policy
//!
//! A [`Filter`] decides, per hardware name, whether station events are
//! forwarded and whether commands are accepted. Stations without an entry
//! get the filter's defaults. Filters are shared through `Arc`; the last
//! holder to drop its reference frees the filter.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::strmap::StrMap;

/// Policy for one station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    /// Hardware name the entry applies to
    pub hwname: String,
    /// Alternate name the entry can be found by
    #[serde(default)]
    pub alias: String,
    /// Forward events from this station
    pub send_events: bool,
    /// Accept commands for this station
    pub receive_commands: bool,
}

#[derive(Debug, Default)]
struct FilterIndex {
    by_name: StrMap<FilterEntry>,
    by_alias: StrMap<String>,
}

impl FilterIndex {
    /// Drop `alias` from the alias index if it still belongs to `hwname`
    fn unindex_alias(&mut self, alias: &str, hwname: &str) {
        if !alias.is_empty() && self.by_alias.get(alias).map(String::as_str) == Some(hwname) {
            self.by_alias.put(alias, None);
        }
    }
}

/// Shared per-station policy table
#[derive(Debug)]
pub struct Filter {
    name: String,
    default_send_events: bool,
    default_receive_commands: bool,
    index: RwLock<FilterIndex>,
}

impl Filter {
    /// Create a filter that denies everything not explicitly allowed
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_defaults(name, false, false)
    }

    /// Create a filter with the given defaults for unlisted stations
    pub fn with_defaults(
        name: impl Into<String>,
        send_events: bool,
        receive_commands: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            default_send_events: send_events,
            default_receive_commands: receive_commands,
            index: RwLock::new(FilterIndex::default()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, FilterIndex> {
        self.index.read().expect("filter lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, FilterIndex> {
        self.index.write().expect("filter lock poisoned")
    }

    /// Filter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default event policy for unlisted stations
    pub fn default_send_events(&self) -> bool {
        self.default_send_events
    }

    /// Default command policy for unlisted stations
    pub fn default_receive_commands(&self) -> bool {
        self.default_receive_commands
    }

    /// Add or replace the entry for `hwname`
    pub fn add_entry(
        &self,
        hwname: impl Into<String>,
        alias: impl Into<String>,
        send_events: bool,
        receive_commands: bool,
    ) {
        self.insert(FilterEntry {
            hwname: hwname.into(),
            alias: alias.into(),
            send_events,
            receive_commands,
        });
    }

    /// Add or replace an entry
    pub fn insert(&self, entry: FilterEntry) {
        let mut index = self.write();
        let alias = entry.alias.clone();
        let hwname = entry.hwname.clone();

        if let Some(old) = index.by_name.put(&hwname, Some(entry)) {
            if old.alias != alias {
                index.unindex_alias(&old.alias, &hwname);
            }
        }
        if !alias.is_empty() {
            index.by_alias.put(&alias, Some(hwname.clone()));
        }
        tracing::debug!("Filter {}: entry for {} updated", self.name, hwname);
    }

    /// Remove the entry for `hwname`
    pub fn remove_entry(&self, hwname: &str) -> Option<FilterEntry> {
        let mut index = self.write();
        let old = index.by_name.put(hwname, None)?;
        index.unindex_alias(&old.alias, hwname);
        Some(old)
    }

    /// Entry for a hardware name
    pub fn lookup_name(&self, hwname: &str) -> Option<FilterEntry> {
        self.read().by_name.get(hwname).cloned()
    }

    /// Entry for an alias
    pub fn lookup_alias(&self, alias: &str) -> Option<FilterEntry> {
        let index = self.read();
        let hwname = index.by_alias.get(alias)?;
        index.by_name.get(hwname).cloned()
    }

    /// Whether events from `hwname` are forwarded
    pub fn sends_events(&self, hwname: &str) -> bool {
        self.read()
            .by_name
            .get(hwname)
            .map_or(self.default_send_events, |e| e.send_events)
    }

    /// Whether commands for `hwname` are accepted
    pub fn receives_commands(&self, hwname: &str) -> bool {
        self.read()
            .by_name
            .get(hwname)
            .map_or(self.default_receive_commands, |e| e.receive_commands)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.read().by_name.len()
    }

    /// Whether the filter has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serializable description of a filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Filter name
    pub name: String,
    /// Default event policy
    #[serde(default)]
    pub send_events: bool,
    /// Default command policy
    #[serde(default)]
    pub receive_commands: bool,
    /// Explicit station entries
    #[serde(default)]
    pub entries: Vec<FilterEntry>,
}

impl FilterConfig {
    /// Build a shared filter from this description
    pub fn build(&self) -> Arc<Filter> {
        let filter = Filter::with_defaults(&self.name, self.send_events, self.receive_commands);
        for entry in &self.entries {
            filter.insert(entry.clone());
        }
        filter
    }
}
