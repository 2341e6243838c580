//! State and notification core of the AuShell audio unit host.
//!
//! The crate manages the control plane of one hosted plugin instance:
//! capturing and restoring its configuration as portable blobs, persisting
//! those blobs as named presets across the factory, user and local domains,
//! marshalling the plugin's asynchronous property notifications onto the
//! control thread, and tracking bypass and present-preset state in a
//! [`PluginSession`]. Loading plugin binaries, rendering audio and drawing
//! editors live elsewhere; everything this crate needs from a live instance is
//! expressed by the [`AudioUnit`] trait.

pub mod codec;
pub mod component;
pub mod config;
mod error;
pub mod notify;
pub mod null;
pub mod preset;
pub mod session;
pub mod store;
pub mod unit;

pub use codec::{ClassInfo, ParameterScope, ParameterValue, PluginStateCodec, StateBlob};
pub use component::{ComponentDescription, FourCc, InvalidFourCc, StreamFormat};
pub use config::{SessionConfig, SessionConfigFile};
pub use error::{
    CodecError, ConfigError, NotificationError, PluginError, SessionError, StoreError,
};
pub use notify::{NotificationEvent, ParameterNotificationChannel, Subscription};
pub use null::{NullUnit, NullUnitBuilder};
pub use preset::{PresetDomain, PresetGroup, PresetRecord, PresetTree};
pub use session::{ObserverId, PluginInfo, PluginSession, SessionObserver, SessionState};
pub use store::{PresetRoots, PresetStore, PRESET_EXTENSION};
pub use unit::{AuPreset, AudioUnit, ListenerToken, PluginHandle, PropertyId, PropertyListener};
