use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{ClassInfo, PluginStateCodec, StateBlob};
use crate::component::ComponentDescription;
use crate::error::StoreError;
use crate::preset::{PresetDomain, PresetRecord, PresetTree};
use crate::unit::AudioUnit;

/// File extension used for stored presets.
pub const PRESET_EXTENSION: &str = "aupreset";

/// Root directories of the writable preset domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetRoots {
    pub user: PathBuf,
    pub local: PathBuf,
}

impl PresetRoots {
    pub fn new(user: impl Into<PathBuf>, local: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            local: local.into(),
        }
    }

    /// Per-user root below the platform data directory.
    pub fn default_user_root() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("AuShell").join("Presets"))
            .unwrap_or_else(|| PathBuf::from("Presets"))
    }

    /// System-wide root shared by every user.
    pub fn default_local_root() -> PathBuf {
        if cfg!(target_os = "macos") {
            PathBuf::from("/Library/Audio/Presets/AuShell")
        } else if cfg!(target_os = "windows") {
            std::env::var_os("PROGRAMDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
                .join("AuShell")
                .join("Presets")
        } else {
            PathBuf::from("/usr/local/share/aushell/presets")
        }
    }
}

impl Default for PresetRoots {
    fn default() -> Self {
        Self {
            user: Self::default_user_root(),
            local: Self::default_local_root(),
        }
    }
}

/// Preset persistence for one plugin family.
///
/// User and local presets live at
/// `<root>/<type>-<subtype>-<manufacturer>/<name>.aupreset`.
#[derive(Debug, Clone)]
pub struct PresetStore {
    component: ComponentDescription,
    roots: PresetRoots,
    codec: PluginStateCodec,
}

impl PresetStore {
    pub fn new(component: ComponentDescription, roots: PresetRoots) -> Self {
        Self {
            component,
            roots,
            codec: PluginStateCodec::new(),
        }
    }

    pub fn component(&self) -> ComponentDescription {
        self.component
    }

    pub fn roots(&self) -> &PresetRoots {
        &self.roots
    }

    /// Directory holding this component's presets for a writable domain.
    pub fn domain_dir(&self, domain: PresetDomain) -> Option<PathBuf> {
        let root = match domain {
            PresetDomain::User => &self.roots.user,
            PresetDomain::Local => &self.roots.local,
            PresetDomain::Factory | PresetDomain::Custom => return None,
        };
        Some(root.join(self.component.directory_name()))
    }

    pub fn preset_path(&self, domain: PresetDomain, name: &str) -> Option<PathBuf> {
        self.domain_dir(domain)
            .map(|dir| dir.join(format!("{}.{PRESET_EXTENSION}", file_stem_for(name))))
    }

    /// Factory presets in the order the plugin declares them.
    pub fn list_factory_presets(
        &self,
        unit: &dyn AudioUnit,
    ) -> Result<Vec<PresetRecord>, StoreError> {
        Ok(unit
            .factory_presets()?
            .into_iter()
            .map(|preset| PresetRecord::factory(preset.number, preset.name))
            .collect())
    }

    /// Presets stored in a writable domain, sorted by name. Files that cannot
    /// be read or belong to another component are skipped.
    pub fn list_domain(&self, domain: PresetDomain) -> Result<Vec<PresetRecord>, StoreError> {
        let Some(dir) = self.domain_dir(domain) else {
            return Ok(Vec::new());
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(dir, err)),
        };

        let mut presets = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    warn!(dir = %dir.display(), "skipping unreadable directory entry: {err}");
                    continue;
                }
            };
            if path.extension().and_then(|ext| ext.to_str()) != Some(PRESET_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let name = name.to_string();
            match self.read_preset(&path) {
                Ok((state, _)) => presets.push(PresetRecord::stored(domain, name, state, path)),
                Err(err) => warn!(path = %path.display(), "skipping preset: {err}"),
            }
        }
        presets.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(presets)
    }

    /// Full outline: factory presets from the live plugin plus both writable
    /// domains.
    pub fn preset_tree(&self, unit: &dyn AudioUnit) -> Result<PresetTree, StoreError> {
        Ok(PresetTree::from_parts(
            self.list_factory_presets(unit)?,
            self.list_domain(PresetDomain::User)?,
            self.list_domain(PresetDomain::Local)?,
        ))
    }

    /// Persist `state` as `name` in a writable domain, overwriting any preset
    /// with the same name. The blob and the returned record carry the
    /// file-safe form of `name`, the same name [`list_domain`](Self::list_domain)
    /// reports for the file.
    pub fn save(
        &self,
        state: &StateBlob,
        destination: PresetDomain,
        name: &str,
    ) -> Result<PresetRecord, StoreError> {
        let (Some(dir), Some(path)) = (
            self.domain_dir(destination),
            self.preset_path(destination, name),
        ) else {
            return Err(StoreError::ReadOnlyDomain(destination));
        };
        let found = self.codec.decode(state)?.component;
        if found != self.component {
            return Err(StoreError::TypeMismatch {
                path,
                expected: self.component,
                found,
            });
        }
        let stored_name = file_stem_for(name);
        let named = self.codec.rename(state, &stored_name)?;

        fs::create_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;
        fs::write(&path, named.as_bytes()).map_err(|err| StoreError::io(&path, err))?;
        debug!(path = %path.display(), ?destination, "saved preset");
        Ok(PresetRecord::stored(destination, stored_name, named, path))
    }

    /// Write `state`, stamped with `name`, to an arbitrary path.
    pub fn save_to_file(
        &self,
        state: &StateBlob,
        name: &str,
        path: &Path,
    ) -> Result<(), StoreError> {
        let named = self.codec.rename(state, name)?;
        fs::write(path, named.as_bytes()).map_err(|err| StoreError::io(path, err))?;
        debug!(path = %path.display(), "exported preset");
        Ok(())
    }

    /// Read a preset file from anywhere on disk.
    pub fn load_from_file(&self, path: &Path) -> Result<PresetRecord, StoreError> {
        let (blob, info) = self.read_preset(path)?;
        Ok(PresetRecord::custom(
            info.name,
            Some(blob),
            Some(path.to_path_buf()),
        ))
    }

    /// Remove the file backing a user or local preset. Deleting a preset
    /// whose file is already gone succeeds.
    pub fn delete(&self, record: &PresetRecord) -> Result<(), StoreError> {
        let domain = record.domain();
        let path = match record.path() {
            Some(path) if domain.is_writable() => path.to_path_buf(),
            _ => {
                return Err(StoreError::NotDeletable {
                    domain,
                    name: record.name().to_string(),
                })
            }
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "deleted preset");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "preset already removed");
                Ok(())
            }
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    fn read_preset(&self, path: &Path) -> Result<(StateBlob, ClassInfo), StoreError> {
        let blob = StateBlob::from(fs::read(path).map_err(|err| StoreError::io(path, err))?);
        let info = self
            .codec
            .decode(&blob)
            .map_err(|err| StoreError::NotAPreset {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        if info.component != self.component {
            return Err(StoreError::TypeMismatch {
                path: path.to_path_buf(),
                expected: self.component,
                found: info.component,
            });
        }
        Ok((blob, info))
    }
}

/// Preset name as a file stem: path separators and control characters become
/// `-`.
fn file_stem_for(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' => '-',
            ch if ch.is_control() => '-',
            ch => ch,
        })
        .collect();
    if stem.is_empty() || stem.starts_with('.') {
        format!("Untitled{stem}")
    } else {
        stem
    }
}
