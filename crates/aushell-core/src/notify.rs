//! Marshalling of plugin property notifications onto the control thread.
//!
//! Plugins call their listeners from arbitrary threads. Each listener decodes
//! the changed property into a [`NotificationEvent`] and enqueues it on a
//! bounded channel under a single producer lock, stamping a per-property
//! sequence number. The control thread drains the queue with
//! [`ParameterNotificationChannel::dispatch`]. Events that cannot be decoded
//! or queued are dropped and logged; delivery of later events is unaffected.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::component::StreamFormat;
use crate::error::{NotificationError, PluginError};
use crate::preset::PresetRecord;
use crate::unit::{AuPreset, AudioUnit, ListenerToken, PluginHandle, PropertyId, PropertyListener};

/// Default number of undelivered events buffered before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Host-observable change reported by the plugin.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    NameChanged(String),
    ManufacturerChanged(String),
    PresentPresetChanged(Option<PresetRecord>),
    StreamFormatChanged(StreamFormat),
    BypassChanged(bool),
}

impl NotificationEvent {
    pub fn property(&self) -> PropertyId {
        match self {
            NotificationEvent::NameChanged(_) => PropertyId::Name,
            NotificationEvent::ManufacturerChanged(_) => PropertyId::Manufacturer,
            NotificationEvent::PresentPresetChanged(_) => PropertyId::PresentPreset,
            NotificationEvent::StreamFormatChanged(_) => PropertyId::StreamFormat,
            NotificationEvent::BypassChanged(_) => PropertyId::BypassEffect,
        }
    }
}

/// Record describing a preset as reported by the plugin.
pub(crate) fn present_record(preset: AuPreset) -> PresetRecord {
    if preset.is_factory() {
        PresetRecord::factory(preset.number, preset.name)
    } else {
        PresetRecord::custom(preset.name, None, None)
    }
}

/// Query the plugin for the current value of `property`.
pub(crate) fn decode_property(
    unit: &dyn AudioUnit,
    property: PropertyId,
) -> Result<NotificationEvent, PluginError> {
    Ok(match property {
        PropertyId::Name => NotificationEvent::NameChanged(unit.name()?),
        PropertyId::Manufacturer => NotificationEvent::ManufacturerChanged(unit.manufacturer()?),
        PropertyId::PresentPreset => {
            NotificationEvent::PresentPresetChanged(unit.present_preset()?.map(present_record))
        }
        PropertyId::StreamFormat => NotificationEvent::StreamFormatChanged(unit.stream_format()?),
        PropertyId::BypassEffect => NotificationEvent::BypassChanged(unit.is_bypassed()?),
    })
}

#[derive(Debug)]
struct Envelope {
    property: PropertyId,
    sequence: u64,
    event: NotificationEvent,
}

#[derive(Debug)]
struct Producer {
    sender: Sender<Envelope>,
    sequences: HashMap<PropertyId, u64>,
}

impl Producer {
    fn forward(&mut self, unit: &Weak<dyn AudioUnit>, property: PropertyId) {
        let sequence = {
            let counter = self.sequences.entry(property).or_insert(0);
            *counter += 1;
            *counter
        };
        let Some(unit) = unit.upgrade() else {
            warn!(?property, sequence, "dropping notification from released plugin");
            return;
        };
        let event = match decode_property(unit.as_ref(), property) {
            Ok(event) => event,
            Err(err) => {
                warn!(?property, sequence, "dropping undecodable notification: {err}");
                return;
            }
        };
        match self.sender.try_send(Envelope {
            property,
            sequence,
            event,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(?property, sequence, "notification queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(?property, sequence, "notification channel closed");
            }
        }
    }
}

/// Registered property listeners on one plugin instance.
///
/// Dropping the guard removes the listeners. The plugin must still be alive
/// at that point; a plugin released while still holding listeners is a
/// lifecycle bug and panics.
pub struct Subscription {
    unit: Weak<dyn AudioUnit>,
    unit_addr: usize,
    tokens: Vec<ListenerToken>,
}

impl Subscription {
    fn is_for(&self, handle: &PluginHandle) -> bool {
        self.unit_addr == handle_addr(handle)
    }

    /// Remove all listeners now.
    pub fn release(mut self) {
        self.release_listeners();
    }

    fn release_listeners(&mut self) {
        if self.tokens.is_empty() {
            return;
        }
        let Some(unit) = self.unit.upgrade() else {
            panic!("plugin instance was released before its property listeners were removed");
        };
        for token in self.tokens.drain(..) {
            if let Err(err) = unit.remove_property_listener(token) {
                warn!(?token, "failed to remove property listener: {err}");
            }
        }
        debug!("property listeners removed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        self.release_listeners();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("tokens", &self.tokens)
            .finish()
    }
}

fn handle_addr(handle: &PluginHandle) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

/// Bridge between plugin notification threads and the control thread.
#[derive(Debug)]
pub struct ParameterNotificationChannel {
    producer: Arc<Mutex<Producer>>,
    receiver: Receiver<Envelope>,
    subscription: Option<Subscription>,
    delivered: HashMap<PropertyId, u64>,
}

impl Default for ParameterNotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterNotificationChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            producer: Arc::new(Mutex::new(Producer {
                sender,
                sequences: HashMap::new(),
            })),
            receiver,
            subscription: None,
            delivered: HashMap::new(),
        }
    }

    /// Register for every watched property of `handle`. Subscribing again to
    /// the same instance is a no-op.
    pub fn subscribe(&mut self, handle: &PluginHandle) -> Result<(), NotificationError> {
        if let Some(subscription) = &self.subscription {
            if subscription.is_for(handle) {
                return Ok(());
            }
            return Err(NotificationError::AlreadySubscribed);
        }

        let mut subscription = Subscription {
            unit: Arc::downgrade(handle),
            unit_addr: handle_addr(handle),
            tokens: Vec::with_capacity(PropertyId::WATCHED.len()),
        };
        for property in PropertyId::WATCHED {
            let weak = Arc::downgrade(handle);
            let producer = Arc::clone(&self.producer);
            let listener: PropertyListener = Arc::new(move |changed: PropertyId| {
                producer.lock().forward(&weak, changed);
            });
            // On failure the partially built guard drops and removes what was
            // already registered.
            let token = handle.add_property_listener(property, listener)?;
            subscription.tokens.push(token);
        }
        debug!(listeners = subscription.tokens.len(), "subscribed to plugin notifications");
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Remove the listeners. Safe to call when not subscribed.
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Events waiting for dispatch.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Deliver queued events to `callback` on the calling thread, in the
    /// order they were queued. Only events queued before the call are
    /// delivered, so a chatty plugin cannot keep the caller looping.
    pub fn dispatch(&mut self, mut callback: impl FnMut(NotificationEvent)) -> usize {
        let pending = self.receiver.len();
        let mut delivered = 0;
        for _ in 0..pending {
            let Ok(envelope) = self.receiver.try_recv() else {
                break;
            };
            let last = self.delivered.entry(envelope.property).or_insert(0);
            debug_assert!(envelope.sequence > *last, "notifications reordered");
            if envelope.sequence > *last + 1 {
                debug!(
                    property = ?envelope.property,
                    missed = envelope.sequence - *last - 1,
                    "notifications dropped before delivery"
                );
            }
            *last = envelope.sequence;
            callback(envelope.event);
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::null::NullUnit;

    fn subscribed(unit: &Arc<NullUnit>, capacity: usize) -> (PluginHandle, ParameterNotificationChannel) {
        let handle: PluginHandle = unit.clone();
        let mut channel = ParameterNotificationChannel::with_capacity(capacity);
        channel.subscribe(&handle).unwrap();
        (handle, channel)
    }

    fn drain(channel: &mut ParameterNotificationChannel) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        channel.dispatch(|event| events.push(event));
        events
    }

    #[test]
    fn subscribe_is_idempotent() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (handle, mut channel) = subscribed(&unit, 16);
        channel.subscribe(&handle).unwrap();
        assert_eq!(unit.listener_count(), PropertyId::WATCHED.len());

        let other: PluginHandle = NullUnit::builder("Other", "Acme").build();
        assert!(matches!(
            channel.subscribe(&other),
            Err(NotificationError::AlreadySubscribed)
        ));

        channel.unsubscribe();
        channel.unsubscribe();
        assert_eq!(unit.listener_count(), 0);
        assert!(!channel.is_subscribed());
    }

    #[test]
    fn events_are_decoded_and_held_until_dispatch() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (_handle, mut channel) = subscribed(&unit, 16);

        unit.set_bypassed(true).unwrap();
        unit.rename("Synth II");
        assert_eq!(channel.pending(), 2);

        assert_eq!(
            drain(&mut channel),
            vec![
                NotificationEvent::BypassChanged(true),
                NotificationEvent::NameChanged("Synth II".into()),
            ]
        );
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn undecodable_event_is_dropped_and_delivery_continues() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (_handle, mut channel) = subscribed(&unit, 16);

        unit.withhold(PropertyId::StreamFormat, true);
        unit.set_stream_format(StreamFormat {
            sample_rate: 96_000.0,
            channels: 2,
        });
        unit.set_bypassed(true).unwrap();
        unit.withhold(PropertyId::StreamFormat, false);
        unit.set_stream_format(StreamFormat {
            sample_rate: 48_000.0,
            channels: 1,
        });

        assert_eq!(
            drain(&mut channel),
            vec![
                NotificationEvent::BypassChanged(true),
                NotificationEvent::StreamFormatChanged(StreamFormat {
                    sample_rate: 48_000.0,
                    channels: 1,
                }),
            ]
        );
    }

    #[test]
    fn full_queue_drops_newest_events_only() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (_handle, mut channel) = subscribed(&unit, 2);

        unit.rename("one");
        unit.rename("two");
        unit.rename("three");
        assert_eq!(
            drain(&mut channel),
            vec![
                NotificationEvent::NameChanged("one".into()),
                NotificationEvent::NameChanged("two".into()),
            ]
        );

        unit.rename("four");
        assert_eq!(
            drain(&mut channel),
            vec![NotificationEvent::NameChanged("four".into())]
        );
    }

    #[test]
    fn per_property_order_survives_concurrent_emitters() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (_handle, mut channel) = subscribed(&unit, 1024);

        let renamer = {
            let unit = Arc::clone(&unit);
            thread::spawn(move || {
                for i in 0..100 {
                    unit.rename(format!("name-{i:03}"));
                }
            })
        };
        let toggler = {
            let unit = Arc::clone(&unit);
            thread::spawn(move || {
                for i in 0..100 {
                    unit.set_bypassed(i % 2 == 0).unwrap();
                }
            })
        };
        renamer.join().unwrap();
        toggler.join().unwrap();

        let events = drain(&mut channel);
        let names: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                NotificationEvent::NameChanged(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = (0..100).map(|i| format!("name-{i:03}")).collect();
        assert_eq!(names, expected);

        let bypass: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                NotificationEvent::BypassChanged(value) => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(bypass.len(), 100);
        assert_eq!(bypass.last(), Some(&false));
    }

    #[test]
    fn last_event_matches_final_state_with_racing_writers() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (_handle, mut channel) = subscribed(&unit, 1024);

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let unit = Arc::clone(&unit);
                thread::spawn(move || {
                    for i in 0..50 {
                        unit.rename(format!("w{writer}-{i}"));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let last = drain(&mut channel)
            .into_iter()
            .filter(|event| event.property() == PropertyId::Name)
            .last();
        assert_eq!(
            last,
            Some(NotificationEvent::NameChanged(unit.name().unwrap()))
        );
    }

    #[test]
    fn dispatch_only_drains_events_present_at_call() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (_handle, mut channel) = subscribed(&unit, 16);
        unit.set_bypassed(true).unwrap();

        let mut seen = Vec::new();
        let delivered = channel.dispatch(|event| {
            seen.push(event);
            unit.set_bypassed(false).unwrap();
        });
        assert_eq!(delivered, 1);
        assert_eq!(seen, vec![NotificationEvent::BypassChanged(true)]);
        assert_eq!(channel.pending(), 1);
    }

    #[test]
    #[should_panic(expected = "released before its property listeners")]
    fn releasing_plugin_before_unsubscribing_panics() {
        let unit = NullUnit::builder("Synth", "Acme").build();
        let (handle, mut channel) = subscribed(&unit, 16);
        drop(handle);
        drop(unit);
        channel.unsubscribe();
    }
}
