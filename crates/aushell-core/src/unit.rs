//! Contract between the host core and a hosted plugin instance.
//!
//! The concrete hosting API (component loading, render callbacks, editor
//! views) lives outside this crate. Everything the state and notification
//! layers need from a live instance is expressed by [`AudioUnit`].

use std::sync::Arc;

use crate::codec::ClassInfo;
use crate::component::{ComponentDescription, StreamFormat};
use crate::error::PluginError;

/// Shared reference to one live plugin instance.
pub type PluginHandle = Arc<dyn AudioUnit>;

/// Callback invoked by the plugin, possibly from one of its own threads,
/// whenever a watched property changes.
pub type PropertyListener = Arc<dyn Fn(PropertyId) + Send + Sync>;

/// Properties the host observes for change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyId {
    Name,
    Manufacturer,
    PresentPreset,
    StreamFormat,
    BypassEffect,
}

impl PropertyId {
    pub const WATCHED: [PropertyId; 5] = [
        PropertyId::Name,
        PropertyId::Manufacturer,
        PropertyId::PresentPreset,
        PropertyId::StreamFormat,
        PropertyId::BypassEffect,
    ];
}

/// Preset reference as reported by the plugin: factory presets carry a
/// non-negative number, user-defined ones a negative number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuPreset {
    pub number: i32,
    pub name: String,
}

impl AuPreset {
    pub fn new(number: i32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }

    pub fn is_factory(&self) -> bool {
        self.number >= 0
    }
}

/// Opaque token identifying a registered property listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

/// Control-plane interface of a hosted plugin instance.
///
/// Implementations must be internally synchronized: listeners may be
/// registered from the control thread while the plugin notifies from its own
/// threads. Listeners must not be invoked while the implementation holds a
/// lock that the `AudioUnit` query methods also take.
pub trait AudioUnit: Send + Sync {
    /// Identity of the plugin family this instance belongs to.
    fn component(&self) -> ComponentDescription;
    fn name(&self) -> Result<String, PluginError>;
    fn manufacturer(&self) -> Result<String, PluginError>;
    /// Full configuration state (parameter values and vendor data).
    fn class_info(&self) -> Result<ClassInfo, PluginError>;
    fn set_class_info(&self, info: &ClassInfo) -> Result<(), PluginError>;
    /// Static factory preset table in plugin-declared order.
    fn factory_presets(&self) -> Result<Vec<AuPreset>, PluginError>;
    fn select_factory_preset(&self, number: i32) -> Result<(), PluginError>;
    fn present_preset(&self) -> Result<Option<AuPreset>, PluginError>;
    fn stream_format(&self) -> Result<StreamFormat, PluginError>;
    fn is_bypassed(&self) -> Result<bool, PluginError>;
    fn set_bypassed(&self, bypassed: bool) -> Result<(), PluginError>;
    fn add_property_listener(
        &self,
        property: PropertyId,
        listener: PropertyListener,
    ) -> Result<ListenerToken, PluginError>;
    fn remove_property_listener(&self, token: ListenerToken) -> Result<(), PluginError>;
}
