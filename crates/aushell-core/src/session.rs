//! Lifecycle of one hosted plugin instance.
//!
//! A [`PluginSession`] is either idle or bound to exactly one plugin. While
//! bound it owns the plugin handle, the notification subscription and a
//! preset store scoped to the plugin's component. The session is driven from
//! a single control thread; plugin notifications reach it only through
//! [`PluginSession::dispatch_notifications`].

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::PluginStateCodec;
use crate::component::StreamFormat;
use crate::config::SessionConfig;
use crate::error::{CodecError, SessionError};
use crate::notify::{
    present_record, NotificationEvent, ParameterNotificationChannel, DEFAULT_QUEUE_CAPACITY,
};
use crate::preset::{PresetDomain, PresetRecord, PresetTree};
use crate::store::{PresetRoots, PresetStore};
use crate::unit::PluginHandle;

/// Identity of the bound plugin as last reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub manufacturer: String,
}

/// Everything a view needs to render the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub bypassed: bool,
    pub present_preset: Option<PresetRecord>,
    pub preset_tree: PresetTree,
    pub plugin: Option<PluginInfo>,
    pub stream_format: Option<StreamFormat>,
}

/// Codec restores kept while their echo from the plugin is outstanding.
const MAX_PENDING_PRESETS: usize = 16;

/// Presets restored through the codec whose present-preset echo has not been
/// dispatched yet, oldest first. Each entry carries the name embedded in the
/// restored blob, which is what the plugin reports back.
#[derive(Debug, Default)]
struct PendingPresets {
    queue: VecDeque<(String, PresetRecord)>,
}

impl PendingPresets {
    fn push(&mut self, echoed_name: String, record: PresetRecord) {
        if self.queue.len() == MAX_PENDING_PRESETS {
            self.queue.pop_front();
        }
        self.queue.push_back((echoed_name, record));
    }

    /// Oldest pending record restored under `echoed_name`. Entries queued
    /// before it are dropped; their echoes were lost.
    fn resolve(&mut self, echoed_name: &str) -> Option<PresetRecord> {
        let position = self
            .queue
            .iter()
            .position(|(name, _)| name == echoed_name)?;
        self.queue
            .drain(..=position)
            .last()
            .map(|(_, record)| record)
    }

    fn forget(&mut self, record: &PresetRecord) {
        self.queue.retain(|(_, pending)| !pending.refers_to(record));
    }
}

/// Receives session changes on the control thread.
pub trait SessionObserver: Send + Sync {
    /// Called for every plugin notification, before it is applied.
    fn on_notification(&self, _event: &NotificationEvent) {}
    /// Called after the session state changed.
    fn on_session_state_changed(&self, _state: &SessionState) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct BoundSession {
    // Dropped before `handle` so listeners are removed while the plugin lives.
    channel: ParameterNotificationChannel,
    store: PresetStore,
    pending: PendingPresets,
    handle: PluginHandle,
}

impl BoundSession {
    fn release(mut self) {
        self.channel.unsubscribe();
    }
}

/// Owner of one live plugin and its preset/notification plumbing.
pub struct PluginSession {
    roots: PresetRoots,
    capacity: usize,
    codec: PluginStateCodec,
    bound: Option<BoundSession>,
    state: SessionState,
    observers: Vec<(ObserverId, Arc<dyn SessionObserver>)>,
    next_observer: u64,
}

impl std::fmt::Debug for PluginSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSession")
            .field("roots", &self.roots)
            .field("bound", &self.bound.is_some())
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl PluginSession {
    pub fn new(roots: PresetRoots) -> Self {
        Self {
            roots,
            capacity: DEFAULT_QUEUE_CAPACITY,
            codec: PluginStateCodec::new(),
            bound: None,
            state: SessionState::default(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.preset_roots()).with_notification_capacity(config.notification_capacity())
    }

    /// Queue size used for subsequent binds.
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn handle(&self) -> Option<&PluginHandle> {
        self.bound.as_ref().map(|bound| &bound.handle)
    }

    pub fn store(&self) -> Option<&PresetStore> {
        self.bound.as_ref().map(|bound| &bound.store)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Snapshot of the session for rendering. Default while idle.
    pub fn current_state(&self) -> SessionState {
        self.state.clone()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SessionObserver>) -> ObserverId {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, observer));
        id
    }

    /// Returns whether `id` was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Take ownership of `handle`, subscribe to its notifications and read its
    /// initial state. The preset tree stays empty until
    /// [`refresh_presets`](Self::refresh_presets).
    pub fn bind(&mut self, handle: PluginHandle) -> Result<(), SessionError> {
        if self.bound.is_some() {
            return Err(SessionError::AlreadyBound);
        }

        let mut channel = ParameterNotificationChannel::with_capacity(self.capacity);
        channel.subscribe(&handle)?;
        let bound = BoundSession {
            channel,
            store: PresetStore::new(handle.component(), self.roots.clone()),
            pending: PendingPresets::default(),
            handle,
        };

        let state = match initial_state(&bound.handle) {
            Ok(state) => state,
            Err(err) => {
                bound.release();
                return Err(err);
            }
        };
        info!(
            component = %bound.handle.component(),
            plugin = state.plugin.as_ref().map(|p| p.name.as_str()).unwrap_or_default(),
            "bound plugin"
        );
        self.bound = Some(bound);
        self.state = state;
        self.publish_state();
        Ok(())
    }

    /// Release the subscription, the store and the handle. Does nothing when
    /// idle.
    pub fn unbind(&mut self) {
        let Some(bound) = self.bound.take() else {
            return;
        };
        bound.release();
        self.state = SessionState::default();
        debug!("unbound plugin");
        self.publish_state();
    }

    /// Flip the plugin's bypass flag and return the value it acknowledges.
    pub fn toggle_bypass(&mut self) -> Result<bool, SessionError> {
        let bound = self.bound.as_ref().ok_or(SessionError::NotBound)?;
        let requested = !bound.handle.is_bypassed()?;
        bound.handle.set_bypassed(requested)?;
        let acknowledged = bound.handle.is_bypassed()?;
        if acknowledged != requested {
            warn!(requested, acknowledged, "plugin did not apply bypass request");
        }
        self.state.bypassed = acknowledged;
        self.publish_state();
        Ok(acknowledged)
    }

    /// Capture the current state as `name` in a writable domain. The returned
    /// record carries the file-safe form of `name`.
    pub fn save_preset(
        &mut self,
        domain: PresetDomain,
        name: &str,
    ) -> Result<PresetRecord, SessionError> {
        let bound = self.bound.as_mut().ok_or(SessionError::NotBound)?;
        let snapshot = self.codec.snapshot(bound.handle.as_ref())?;
        let record = bound.store.save(&snapshot, domain, name)?;
        self.state.preset_tree.upsert(record.clone());
        self.state.present_preset = Some(record.clone());
        self.publish_state();
        Ok(record)
    }

    /// Select factory preset `index` through the plugin's own preset table.
    pub fn load_factory_preset(&mut self, index: i32, name: &str) -> Result<(), SessionError> {
        let bound = self.bound.as_mut().ok_or(SessionError::NotBound)?;
        let table = bound.handle.factory_presets()?;
        let Some(entry) = table.iter().find(|preset| preset.number == index) else {
            return Err(SessionError::IndexOutOfRange {
                index,
                available: table.len(),
            });
        };
        if entry.name != name {
            debug!(index, requested = name, actual = %entry.name, "factory preset was renamed");
        }
        let record = PresetRecord::factory(index, entry.name.clone());
        bound.handle.select_factory_preset(index)?;
        self.state.present_preset = Some(record);
        self.publish_state();
        Ok(())
    }

    /// Apply any record from the preset tree.
    pub fn load_preset(&mut self, record: &PresetRecord) -> Result<(), SessionError> {
        if let Some(index) = record.index() {
            return self.load_factory_preset(index, record.name());
        }
        self.restore_record(record.clone())
    }

    /// Delete a user or local preset and drop it from the tree.
    pub fn delete_preset(&mut self, record: &PresetRecord) -> Result<(), SessionError> {
        let bound = self.bound.as_mut().ok_or(SessionError::NotBound)?;
        bound.store.delete(record)?;
        bound.pending.forget(record);
        self.state.preset_tree.remove(record.domain(), record.name());
        if self
            .state
            .present_preset
            .as_ref()
            .is_some_and(|present| present.refers_to(record))
        {
            self.state.present_preset = None;
        }
        self.publish_state();
        Ok(())
    }

    /// Restore a preset file from anywhere on disk. The tree is untouched.
    pub fn load_preset_from_file(&mut self, path: &Path) -> Result<PresetRecord, SessionError> {
        let bound = self.bound.as_ref().ok_or(SessionError::NotBound)?;
        let record = bound.store.load_from_file(path)?;
        self.restore_record(record.clone())?;
        Ok(record)
    }

    /// Write the current state to `path` under `name`. The tree is untouched.
    pub fn save_preset_to_file(&mut self, path: &Path, name: &str) -> Result<(), SessionError> {
        let bound = self.bound.as_ref().ok_or(SessionError::NotBound)?;
        let snapshot = self.codec.snapshot(bound.handle.as_ref())?;
        bound.store.save_to_file(&snapshot, name, path)?;
        Ok(())
    }

    /// Rebuild the preset tree from the plugin and the preset directories.
    pub fn refresh_presets(&mut self) -> Result<(), SessionError> {
        let bound = self.bound.as_ref().ok_or(SessionError::NotBound)?;
        let tree = bound.store.preset_tree(bound.handle.as_ref())?;
        debug!(presets = tree.len(), "preset tree refreshed");
        self.state.preset_tree = tree;
        self.publish_state();
        Ok(())
    }

    /// Deliver queued plugin notifications to observers and apply them.
    /// Returns the number of events handled; zero while idle.
    pub fn dispatch_notifications(&mut self) -> usize {
        let Some(bound) = self.bound.as_mut() else {
            return 0;
        };
        let mut events = Vec::new();
        bound.channel.dispatch(|event| events.push(event));

        let mut changed = false;
        for event in &events {
            for (_, observer) in &self.observers {
                observer.on_notification(event);
            }
            changed |= apply_event(&mut self.state, &mut bound.pending, event);
        }
        if changed {
            self.publish_state();
        }
        events.len()
    }

    fn restore_record(&mut self, record: PresetRecord) -> Result<(), SessionError> {
        let bound = self.bound.as_mut().ok_or(SessionError::NotBound)?;
        let blob = record.state().ok_or_else(|| {
            CodecError::StateUnavailable(format!("preset '{}' carries no state", record.name()))
        })?;
        let echoed_name = self.codec.decode(blob)?.name;
        self.codec.restore(bound.handle.as_ref(), blob)?;
        debug!(preset = record.name(), domain = ?record.domain(), "restored preset");
        bound.pending.push(echoed_name, record.clone());
        self.state.present_preset = Some(record);
        self.publish_state();
        Ok(())
    }

    fn publish_state(&self) {
        for (_, observer) in &self.observers {
            observer.on_session_state_changed(&self.state);
        }
    }
}

fn initial_state(handle: &PluginHandle) -> Result<SessionState, SessionError> {
    let name = handle.name()?;
    let manufacturer = handle.manufacturer()?;
    let bypassed = handle.is_bypassed()?;
    let present_preset = match handle.present_preset() {
        Ok(preset) => preset.map(present_record),
        Err(err) => {
            debug!("plugin does not report a present preset: {err}");
            None
        }
    };
    let stream_format = match handle.stream_format() {
        Ok(format) => Some(format),
        Err(err) => {
            debug!("plugin does not report a stream format: {err}");
            None
        }
    };
    Ok(SessionState {
        bypassed,
        present_preset,
        preset_tree: PresetTree::new(),
        plugin: Some(PluginInfo { name, manufacturer }),
        stream_format,
    })
}

/// Fold one notification into the session state. Returns whether anything
/// visible changed.
fn apply_event(
    state: &mut SessionState,
    pending: &mut PendingPresets,
    event: &NotificationEvent,
) -> bool {
    match event {
        NotificationEvent::NameChanged(name) => {
            let info = state.plugin.get_or_insert_with(|| PluginInfo {
                name: String::new(),
                manufacturer: String::new(),
            });
            if info.name == *name {
                return false;
            }
            info.name = name.clone();
            true
        }
        NotificationEvent::ManufacturerChanged(manufacturer) => {
            let info = state.plugin.get_or_insert_with(|| PluginInfo {
                name: String::new(),
                manufacturer: String::new(),
            });
            if info.manufacturer == *manufacturer {
                return false;
            }
            info.manufacturer = manufacturer.clone();
            true
        }
        NotificationEvent::PresentPresetChanged(reported) => {
            let resolved = match reported {
                Some(reported) if reported.domain() == PresetDomain::Custom => Some(
                    pending
                        .resolve(reported.name())
                        .unwrap_or_else(|| reported.clone()),
                ),
                reported => reported.clone(),
            };
            if state.present_preset == resolved {
                return false;
            }
            state.present_preset = resolved;
            true
        }
        NotificationEvent::StreamFormatChanged(format) => {
            if state.stream_format == Some(*format) {
                return false;
            }
            state.stream_format = Some(*format);
            true
        }
        NotificationEvent::BypassChanged(reported) => {
            if *reported != state.bypassed {
                debug!(reported, committed = state.bypassed, "bypass notification ignored");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::error::StoreError;
    use crate::null::NullUnit;
    use crate::unit::AudioUnit;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<NotificationEvent>>,
        states: Mutex<Vec<SessionState>>,
    }

    impl SessionObserver for Recorder {
        fn on_notification(&self, event: &NotificationEvent) {
            self.events.lock().push(event.clone());
        }

        fn on_session_state_changed(&self, state: &SessionState) {
            self.states.lock().push(state.clone());
        }
    }

    fn synth() -> Arc<NullUnit> {
        NullUnit::builder("Synth", "Acme")
            .parameter(0, 0.5)
            .factory_preset("Init", &[(0, 0.5)])
            .factory_preset("Bright", &[(0, 0.9)])
            .build()
    }

    fn session(dir: &TempDir) -> PluginSession {
        PluginSession::new(PresetRoots::new(
            dir.path().join("user"),
            dir.path().join("local"),
        ))
    }

    #[test]
    fn operations_require_a_bound_plugin() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir);
        assert!(matches!(session.toggle_bypass(), Err(SessionError::NotBound)));
        assert!(matches!(
            session.save_preset(PresetDomain::User, "x"),
            Err(SessionError::NotBound)
        ));
        assert!(matches!(session.refresh_presets(), Err(SessionError::NotBound)));
        assert_eq!(session.dispatch_notifications(), 0);
        assert_eq!(session.current_state(), SessionState::default());
        session.unbind();
    }

    #[test]
    fn bind_reads_initial_state() {
        let dir = tempdir().unwrap();
        let unit = NullUnit::builder("Delay", "Acme").bypassed(true).build();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        let state = session.current_state();
        assert!(state.bypassed);
        assert_eq!(
            state.plugin,
            Some(PluginInfo {
                name: "Delay".into(),
                manufacturer: "Acme".into(),
            })
        );
        assert_eq!(state.stream_format, Some(StreamFormat::default()));
        assert!(state.preset_tree.is_empty());
        assert_eq!(unit.listener_count(), 5);

        assert!(matches!(
            session.bind(synth()),
            Err(SessionError::AlreadyBound)
        ));
    }

    #[test]
    fn failed_bind_leaves_no_listeners_behind() {
        let dir = tempdir().unwrap();
        let unit = synth();
        unit.withhold(crate::unit::PropertyId::BypassEffect, true);
        let mut session = session(&dir);
        assert!(matches!(
            session.bind(unit.clone()),
            Err(SessionError::PluginRejected(_))
        ));
        assert!(!session.is_bound());
        assert_eq!(unit.listener_count(), 0);
    }

    #[test]
    fn toggle_commits_acknowledged_value() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        assert!(session.toggle_bypass().unwrap());
        assert!(!session.toggle_bypass().unwrap());

        unit.reject_bypass(true);
        assert!(session.toggle_bypass().is_err());
        assert!(!session.state().bypassed);
    }

    #[test]
    fn bypass_notifications_reach_observers_without_mutating_state() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let recorder = Arc::new(Recorder::default());
        let mut session = session(&dir);
        session.add_observer(recorder.clone());
        session.bind(unit.clone()).unwrap();

        session.toggle_bypass().unwrap();
        unit.set_bypassed(false).unwrap();
        assert_eq!(session.dispatch_notifications(), 2);
        assert!(session.state().bypassed);
        assert_eq!(
            *recorder.events.lock(),
            vec![
                NotificationEvent::BypassChanged(true),
                NotificationEvent::BypassChanged(false),
            ]
        );
    }

    #[test]
    fn save_preset_updates_tree_and_present_preset() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        let record = session.save_preset(PresetDomain::User, "Lead Tone").unwrap();
        let state = session.current_state();
        assert_eq!(state.present_preset.as_ref(), Some(&record));
        assert_eq!(
            state.preset_tree.find(PresetDomain::User, "Lead Tone"),
            Some(&record)
        );
        let stored = PluginStateCodec::new().decode(record.state().unwrap()).unwrap();
        assert_eq!(stored.name, "Lead Tone");

        assert!(matches!(
            session.save_preset(PresetDomain::Factory, "Nope"),
            Err(SessionError::Store(StoreError::ReadOnlyDomain(PresetDomain::Factory)))
        ));
    }

    #[test]
    fn restored_preset_survives_plugin_echo() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        let record = session.save_preset(PresetDomain::Local, "Pad").unwrap();
        unit.set_parameter(0, 0.1);
        session.load_preset(&record).unwrap();
        assert_eq!(unit.parameter(0), Some(0.5));

        session.dispatch_notifications();
        assert_eq!(session.state().present_preset.as_ref(), Some(&record));
    }

    #[test]
    fn back_to_back_restores_resolve_to_the_last_record() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        let first = session.save_preset(PresetDomain::User, "A").unwrap();
        unit.set_parameter(0, 0.7);
        let second = session.save_preset(PresetDomain::User, "B").unwrap();

        session.load_preset(&first).unwrap();
        session.load_preset(&second).unwrap();
        session.dispatch_notifications();

        let present = session.current_state().present_preset.unwrap();
        assert_eq!(present, second);
        assert_eq!(present.domain(), PresetDomain::User);
        assert!(present.state().is_some());
        assert_eq!(unit.parameter(0), Some(0.7));
    }

    #[test]
    fn pending_presets_skip_entries_whose_echo_was_lost() {
        let mut pending = PendingPresets::default();
        pending.push("A".into(), PresetRecord::custom("A", None, None));
        pending.push("B".into(), PresetRecord::custom("B", None, None));
        pending.push("C".into(), PresetRecord::custom("C", None, None));

        assert_eq!(pending.resolve("B").map(|r| r.name().to_string()), Some("B".into()));
        assert!(pending.resolve("A").is_none());
        assert_eq!(pending.resolve("C").map(|r| r.name().to_string()), Some("C".into()));
        assert!(pending.queue.is_empty());
    }

    #[test]
    fn saved_names_match_the_rebuilt_tree() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        let record = session.save_preset(PresetDomain::User, "A/B").unwrap();
        assert_eq!(record.name(), "A-B");
        let incremental = session.state().preset_tree.clone();
        session.refresh_presets().unwrap();
        let rebuilt = session.state().preset_tree.clone();
        assert_eq!(
            incremental.group(PresetDomain::User),
            rebuilt.group(PresetDomain::User)
        );

        let listed = rebuilt.find(PresetDomain::User, "A-B").unwrap().clone();
        session.load_preset(&listed).unwrap();
        session.dispatch_notifications();
        assert_eq!(session.state().present_preset.as_ref(), Some(&listed));
    }

    #[test]
    fn toggle_starts_from_the_plugin_reported_flag() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        unit.set_bypassed(true).unwrap();
        assert!(!session.state().bypassed);
        assert!(!session.toggle_bypass().unwrap());
        assert!(!unit.is_bypassed().unwrap());
        assert!(!session.state().bypassed);
    }

    #[test]
    fn factory_selection_checks_live_table() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();

        session.load_factory_preset(1, "Bright").unwrap();
        assert_eq!(unit.parameter(0), Some(0.9));
        assert_eq!(
            session.state().present_preset,
            Some(PresetRecord::factory(1, "Bright"))
        );

        unit.replace_factory_presets(&["Only"]);
        assert!(matches!(
            session.load_factory_preset(1, "Bright"),
            Err(SessionError::IndexOutOfRange {
                index: 1,
                available: 1
            })
        ));
    }

    #[test]
    fn delete_clears_tree_entry_and_present_preset() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit).unwrap();
        session.refresh_presets().unwrap();

        let record = session.save_preset(PresetDomain::User, "Scratch").unwrap();
        session.delete_preset(&record).unwrap();
        assert!(session.state().present_preset.is_none());
        assert!(session.state().preset_tree.group(PresetDomain::User).is_none());
        assert!(!record.path().unwrap().exists());

        assert!(matches!(
            session.delete_preset(&PresetRecord::factory(0, "Init")),
            Err(SessionError::Store(StoreError::NotDeletable { .. }))
        ));
    }

    #[test]
    fn file_operations_leave_the_tree_alone() {
        let dir = tempdir().unwrap();
        let unit = synth();
        let mut session = session(&dir);
        session.bind(unit.clone()).unwrap();
        session.refresh_presets().unwrap();
        let tree = session.state().preset_tree.clone();

        let path = dir.path().join("export.aupreset");
        session.save_preset_to_file(&path, "Exported").unwrap();
        unit.set_parameter(0, 0.2);
        let record = session.load_preset_from_file(&path).unwrap();

        assert_eq!(record.domain(), PresetDomain::Custom);
        assert_eq!(unit.parameter(0), Some(0.5));
        assert_eq!(session.state().preset_tree, tree);
        assert_eq!(session.state().present_preset.as_ref(), Some(&record));

        fs::write(&path, b"not a preset").unwrap();
        assert!(session.load_preset_from_file(&path).is_err());
    }

    #[test]
    fn observers_can_be_removed() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut session = session(&dir);
        let id = session.add_observer(recorder.clone());
        session.bind(synth()).unwrap();
        assert!(session.remove_observer(id));
        assert!(!session.remove_observer(id));
        session.unbind();
        assert_eq!(recorder.states.lock().len(), 1);
    }
}
