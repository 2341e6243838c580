//! In-process [`AudioUnit`] implementation.
//!
//! `NullUnit` processes nothing but models the complete control plane of a
//! plugin: parameters, vendor data, a factory preset table, the bypass flag,
//! and property listeners. Listeners run on whichever thread caused the
//! change, which lets tests drive notifications from several threads.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::codec::{ClassInfo, ParameterValue};
use crate::component::{ComponentDescription, FourCc, StreamFormat};
use crate::error::PluginError;
use crate::unit::{AuPreset, AudioUnit, ListenerToken, PropertyId, PropertyListener};

const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone)]
struct FactoryPreset {
    name: String,
    parameters: Vec<ParameterValue>,
}

#[derive(Debug)]
struct NullState {
    name: String,
    manufacturer: String,
    version: u32,
    parameters: Vec<ParameterValue>,
    data: Vec<u8>,
    present: Option<AuPreset>,
    bypassed: bool,
    stream_format: StreamFormat,
    reject_state: bool,
    reject_bypass: bool,
    withheld: Vec<PropertyId>,
}

impl NullState {
    fn check(&self, property: PropertyId, label: &'static str) -> Result<(), PluginError> {
        if self.withheld.contains(&property) {
            Err(PluginError::Unsupported(label))
        } else {
            Ok(())
        }
    }
}

/// Builder for [`NullUnit`].
#[derive(Debug)]
pub struct NullUnitBuilder {
    component: ComponentDescription,
    state: NullState,
    factory: Vec<FactoryPreset>,
}

impl NullUnitBuilder {
    pub fn component(mut self, component: ComponentDescription) -> Self {
        self.component = component;
        self
    }

    pub fn parameter(mut self, id: u32, value: f32) -> Self {
        self.state.parameters.push(ParameterValue::global(id, value));
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.state.data = data;
        self
    }

    /// Append a factory preset; presets are numbered in insertion order.
    pub fn factory_preset(mut self, name: impl Into<String>, values: &[(u32, f32)]) -> Self {
        self.factory.push(FactoryPreset {
            name: name.into(),
            parameters: values
                .iter()
                .map(|&(id, value)| ParameterValue::global(id, value))
                .collect(),
        });
        self
    }

    pub fn stream_format(mut self, format: StreamFormat) -> Self {
        self.state.stream_format = format;
        self
    }

    pub fn bypassed(mut self, bypassed: bool) -> Self {
        self.state.bypassed = bypassed;
        self
    }

    pub fn build(self) -> Arc<NullUnit> {
        Arc::new(NullUnit {
            component: self.component,
            state: Mutex::new(self.state),
            factory: Mutex::new(self.factory),
            listeners: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
            class_info_writes: AtomicUsize::new(0),
        })
    }
}

/// Control-plane-only plugin instance.
pub struct NullUnit {
    component: ComponentDescription,
    state: Mutex<NullState>,
    factory: Mutex<Vec<FactoryPreset>>,
    listeners: Mutex<Vec<(ListenerToken, PropertyId, PropertyListener)>>,
    next_token: AtomicU64,
    class_info_writes: AtomicUsize,
}

impl fmt::Debug for NullUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NullUnit")
            .field("component", &self.component)
            .field("state", &*self.state.lock())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl NullUnit {
    pub fn builder(name: impl Into<String>, manufacturer: impl Into<String>) -> NullUnitBuilder {
        NullUnitBuilder {
            component: ComponentDescription::new(
                FourCc::new(b"aufx"),
                FourCc::new(b"null"),
                FourCc::new(b"AuSh"),
            ),
            state: NullState {
                name: name.into(),
                manufacturer: manufacturer.into(),
                version: 1,
                parameters: Vec::new(),
                data: Vec::new(),
                present: None,
                bypassed: false,
                stream_format: StreamFormat::default(),
                reject_state: false,
                reject_bypass: false,
                withheld: Vec::new(),
            },
            factory: Vec::new(),
        }
    }

    pub fn parameter(&self, id: u32) -> Option<f32> {
        self.state
            .lock()
            .parameters
            .iter()
            .find(|param| param.id == id)
            .map(|param| param.value)
    }

    /// Change a parameter the way a user tweaking the editor would. The
    /// present preset is left alone.
    pub fn set_parameter(&self, id: u32, value: f32) {
        let mut state = self.state.lock();
        match state.parameters.iter_mut().find(|param| param.id == id) {
            Some(param) => param.value = value,
            None => state.parameters.push(ParameterValue::global(id, value)),
        }
    }

    pub fn rename(&self, name: impl Into<String>) {
        self.state.lock().name = name.into();
        self.notify(PropertyId::Name);
    }

    pub fn set_stream_format(&self, format: StreamFormat) {
        self.state.lock().stream_format = format;
        self.notify(PropertyId::StreamFormat);
    }

    /// Replace the factory preset table, as a plugin swapping banks would.
    pub fn replace_factory_presets(&self, presets: &[&str]) {
        *self.factory.lock() = presets
            .iter()
            .map(|name| FactoryPreset {
                name: name.to_string(),
                parameters: Vec::new(),
            })
            .collect();
    }

    /// Make state reads and writes fail.
    pub fn reject_state(&self, reject: bool) {
        self.state.lock().reject_state = reject;
    }

    pub fn reject_bypass(&self, reject: bool) {
        self.state.lock().reject_bypass = reject;
    }

    /// Make queries for `property` fail until called again with `false`.
    pub fn withhold(&self, property: PropertyId, withheld: bool) {
        let mut state = self.state.lock();
        state.withheld.retain(|existing| *existing != property);
        if withheld {
            state.withheld.push(property);
        }
    }

    /// Number of `set_class_info` calls received.
    pub fn class_info_writes(&self) -> usize {
        self.class_info_writes.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Fire the listeners registered for `property` on the calling thread.
    pub fn notify(&self, property: PropertyId) {
        let listeners: Vec<PropertyListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, watched, _)| *watched == property)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(property);
        }
    }
}

impl AudioUnit for NullUnit {
    fn component(&self) -> ComponentDescription {
        self.component
    }

    fn name(&self) -> Result<String, PluginError> {
        let state = self.state.lock();
        state.check(PropertyId::Name, "name")?;
        Ok(state.name.clone())
    }

    fn manufacturer(&self) -> Result<String, PluginError> {
        let state = self.state.lock();
        state.check(PropertyId::Manufacturer, "manufacturer")?;
        Ok(state.manufacturer.clone())
    }

    fn class_info(&self) -> Result<ClassInfo, PluginError> {
        let state = self.state.lock();
        if state.reject_state {
            return Err(PluginError::Refused("class info is locked".into()));
        }
        Ok(ClassInfo {
            version: state.version,
            component: self.component,
            name: state
                .present
                .as_ref()
                .map(|preset| preset.name.clone())
                .unwrap_or_else(|| UNTITLED.to_string()),
            parameters: state.parameters.clone(),
            data: state.data.clone(),
        })
    }

    fn set_class_info(&self, info: &ClassInfo) -> Result<(), PluginError> {
        self.class_info_writes.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            if state.reject_state {
                return Err(PluginError::Refused("class info is locked".into()));
            }
            if info.component != self.component {
                return Err(PluginError::Refused(format!(
                    "class info for {} does not fit {}",
                    info.component, self.component
                )));
            }
            state.version = info.version;
            state.parameters = info.parameters.clone();
            state.data = info.data.clone();
            state.present = Some(AuPreset::new(-1, info.name.clone()));
        }
        self.notify(PropertyId::PresentPreset);
        Ok(())
    }

    fn factory_presets(&self) -> Result<Vec<AuPreset>, PluginError> {
        Ok(self
            .factory
            .lock()
            .iter()
            .enumerate()
            .map(|(number, preset)| AuPreset::new(number as i32, preset.name.clone()))
            .collect())
    }

    fn select_factory_preset(&self, number: i32) -> Result<(), PluginError> {
        let preset = usize::try_from(number)
            .ok()
            .and_then(|index| self.factory.lock().get(index).cloned())
            .ok_or_else(|| PluginError::Refused(format!("no factory preset {number}")))?;
        {
            let mut state = self.state.lock();
            for value in &preset.parameters {
                match state.parameters.iter_mut().find(|param| param.id == value.id) {
                    Some(param) => param.value = value.value,
                    None => state.parameters.push(value.clone()),
                }
            }
            state.present = Some(AuPreset::new(number, preset.name));
        }
        debug!(number, "null unit selected factory preset");
        self.notify(PropertyId::PresentPreset);
        Ok(())
    }

    fn present_preset(&self) -> Result<Option<AuPreset>, PluginError> {
        let state = self.state.lock();
        state.check(PropertyId::PresentPreset, "present preset")?;
        Ok(state.present.clone())
    }

    fn stream_format(&self) -> Result<StreamFormat, PluginError> {
        let state = self.state.lock();
        state.check(PropertyId::StreamFormat, "stream format")?;
        Ok(state.stream_format)
    }

    fn is_bypassed(&self) -> Result<bool, PluginError> {
        let state = self.state.lock();
        state.check(PropertyId::BypassEffect, "bypass")?;
        Ok(state.bypassed)
    }

    fn set_bypassed(&self, bypassed: bool) -> Result<(), PluginError> {
        {
            let mut state = self.state.lock();
            if state.reject_bypass {
                return Err(PluginError::Unsupported("bypass"));
            }
            state.bypassed = bypassed;
        }
        self.notify(PropertyId::BypassEffect);
        Ok(())
    }

    fn add_property_listener(
        &self,
        property: PropertyId,
        listener: PropertyListener,
    ) -> Result<ListenerToken, PluginError> {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::SeqCst) + 1);
        self.listeners.lock().push((token, property, listener));
        Ok(token)
    }

    fn remove_property_listener(&self, token: ListenerToken) -> Result<(), PluginError> {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != token);
        if listeners.len() == before {
            return Err(PluginError::Refused(format!("unknown listener {token:?}")));
        }
        Ok(())
    }
}
