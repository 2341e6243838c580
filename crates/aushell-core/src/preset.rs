use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::StateBlob;

/// Where a preset lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetDomain {
    /// Read-only presets shipped inside the plugin, selected by index.
    Factory,
    /// Per-user presets managed by the host.
    User,
    /// System-wide presets shared by every user.
    Local,
    /// Presets outside any managed domain (arbitrary files, or a state the
    /// plugin reports without a factory index).
    Custom,
}

impl PresetDomain {
    /// Domains shown in the preset outline, in display order.
    pub const TREE_ORDER: [PresetDomain; 3] =
        [PresetDomain::Factory, PresetDomain::User, PresetDomain::Local];

    pub fn label(&self) -> &'static str {
        match self {
            PresetDomain::Factory => "Factory",
            PresetDomain::User => "User",
            PresetDomain::Local => "Local",
            PresetDomain::Custom => "Custom",
        }
    }

    /// Whether presets can be written to and deleted from this domain.
    pub fn is_writable(&self) -> bool {
        matches!(self, PresetDomain::User | PresetDomain::Local)
    }
}

/// Description of one storable configuration.
///
/// Factory records carry an index and never a state; User and Local records
/// always carry their state and backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetRecord {
    name: String,
    domain: PresetDomain,
    index: Option<i32>,
    state: Option<StateBlob>,
    path: Option<PathBuf>,
}

impl PresetRecord {
    pub fn factory(index: i32, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: PresetDomain::Factory,
            index: Some(index),
            state: None,
            path: None,
        }
    }

    /// Record backed by a file in a writable domain.
    pub(crate) fn stored(
        domain: PresetDomain,
        name: impl Into<String>,
        state: StateBlob,
        path: PathBuf,
    ) -> Self {
        debug_assert!(domain.is_writable());
        Self {
            name: name.into(),
            domain,
            index: None,
            state: Some(state),
            path: Some(path),
        }
    }

    /// Record outside the managed domains. `state` is absent when only the
    /// plugin-reported name is known.
    pub fn custom(name: impl Into<String>, state: Option<StateBlob>, path: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            domain: PresetDomain::Custom,
            index: None,
            state,
            path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> PresetDomain {
        self.domain
    }

    pub fn index(&self) -> Option<i32> {
        self.index
    }

    pub fn state(&self) -> Option<&StateBlob> {
        self.state.as_ref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Same preset, ignoring the captured state.
    pub fn refers_to(&self, other: &PresetRecord) -> bool {
        self.domain == other.domain && self.name == other.name && self.index == other.index
    }
}

/// One domain's presets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetGroup {
    pub domain: PresetDomain,
    pub presets: Vec<PresetRecord>,
}

/// Domain-grouped presets backing the preset outline.
///
/// Groups appear in [`PresetDomain::TREE_ORDER`]; empty groups are omitted.
/// Factory presets keep plugin order, user and local presets are sorted by
/// name, so rebuilding from the same sources yields the same tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetTree {
    groups: Vec<PresetGroup>,
}

impl PresetTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from per-domain lists. User and local lists are sorted;
    /// the factory list is kept as given.
    pub fn from_parts(
        factory: Vec<PresetRecord>,
        user: Vec<PresetRecord>,
        local: Vec<PresetRecord>,
    ) -> Self {
        let mut tree = PresetTree::new();
        for (domain, mut presets) in [
            (PresetDomain::Factory, factory),
            (PresetDomain::User, user),
            (PresetDomain::Local, local),
        ] {
            if presets.is_empty() {
                continue;
            }
            if domain != PresetDomain::Factory {
                presets.sort_by(|a, b| a.name.cmp(&b.name));
            }
            tree.groups.push(PresetGroup { domain, presets });
        }
        tree
    }

    pub fn groups(&self) -> &[PresetGroup] {
        &self.groups
    }

    pub fn group(&self, domain: PresetDomain) -> Option<&PresetGroup> {
        self.groups.iter().find(|group| group.domain == domain)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of presets across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.presets.len()).sum()
    }

    pub fn find(&self, domain: PresetDomain, name: &str) -> Option<&PresetRecord> {
        self.group(domain)?
            .presets
            .iter()
            .find(|preset| preset.name == name)
    }

    /// Insert or replace a user/local record, keeping name order.
    pub fn upsert(&mut self, record: PresetRecord) {
        let domain = record.domain;
        if !PresetDomain::TREE_ORDER.contains(&domain) {
            return;
        }
        let position = match self.groups.iter().position(|group| group.domain == domain) {
            Some(position) => position,
            None => {
                let at = self
                    .groups
                    .iter()
                    .position(|group| group.domain > domain)
                    .unwrap_or(self.groups.len());
                self.groups.insert(
                    at,
                    PresetGroup {
                        domain,
                        presets: Vec::new(),
                    },
                );
                at
            }
        };
        let presets = &mut self.groups[position].presets;
        match presets.binary_search_by(|existing| existing.name.cmp(&record.name)) {
            Ok(found) => presets[found] = record,
            Err(insert_at) => presets.insert(insert_at, record),
        }
    }

    /// Remove a record; drops its group once empty.
    pub fn remove(&mut self, domain: PresetDomain, name: &str) -> Option<PresetRecord> {
        let position = self.groups.iter().position(|group| group.domain == domain)?;
        let presets = &mut self.groups[position].presets;
        let index = presets.iter().position(|preset| preset.name == name)?;
        let removed = presets.remove(index);
        if presets.is_empty() {
            self.groups.remove(position);
        }
        Some(removed)
    }
}
