use std::path::PathBuf;

use thiserror::Error;

use crate::component::ComponentDescription;
use crate::preset::PresetDomain;

/// Failure reported by a hosted plugin instance across the [`AudioUnit`](crate::AudioUnit)
/// boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("plugin refused the request: {0}")]
    Refused(String),
    #[error("property {0} is not supported by this plugin")]
    Unsupported(&'static str),
}

/// Errors raised while capturing or restoring plugin state.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("plugin state is unavailable: {0}")]
    StateUnavailable(String),
    #[error("malformed state blob: {0}")]
    MalformedBlob(String),
    #[error("state belongs to {found}, expected {expected}")]
    IncompatibleState {
        expected: ComponentDescription,
        found: ComponentDescription,
    },
    #[error("plugin rejected the state: {0}")]
    PluginRejected(#[source] PluginError),
}

/// Errors raised by the preset store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no permission to write {0}")]
    PermissionDenied(PathBuf),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a preset: {reason}")]
    NotAPreset { path: PathBuf, reason: String },
    #[error("{path} holds a preset for {found}, expected {expected}")]
    TypeMismatch {
        path: PathBuf,
        expected: ComponentDescription,
        found: ComponentDescription,
    },
    #[error("{domain:?} preset '{name}' cannot be deleted")]
    NotDeletable { domain: PresetDomain, name: String },
    #[error("presets cannot be written to the {0:?} domain")]
    ReadOnlyDomain(PresetDomain),
    #[error("failed to encode preset: {0}")]
    Codec(#[from] CodecError),
    #[error("failed to query factory presets: {0}")]
    Plugin(#[from] PluginError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            StoreError::PermissionDenied(path)
        } else {
            StoreError::Io { path, source }
        }
    }
}

/// Errors raised while registering for plugin property notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("channel is already subscribed to another plugin instance")]
    AlreadySubscribed,
    #[error("failed to register property listener: {0}")]
    Subscribe(#[from] PluginError),
}

/// Errors raised while persisting the session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors surfaced to callers of [`PluginSession`](crate::PluginSession) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no plugin is bound to the session")]
    NotBound,
    #[error("a plugin is already bound; unbind it first")]
    AlreadyBound,
    #[error("factory preset index {index} is out of range ({available} presets)")]
    IndexOutOfRange { index: i32, available: usize },
    #[error("plugin rejected the request: {0}")]
    PluginRejected(#[from] PluginError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}
