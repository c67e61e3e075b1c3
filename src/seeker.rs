//! Peripheral discovery, quarantine and ambiguity detection.
//!
//! A [`Seeker`] turns a vendor-specific [`PeripheralSource`] into a set of live
//! [`Device`]s. Per peripheral identity it runs:
//!
//! ```text
//! Unknown ─match─► Candidate ─► SettingUp(n) ─ok─► Active ─gone─► Forgotten
//!                                   │   ▲            │
//!                          recoverable  │            └─poll error─┐
//!                                   └───┘ (n-1)                   ▼
//!                                   └──n == 0 or fatal──────► Troubled
//! ```
//!
//! - Enumeration is rate-limited by `scan_interval_ms`; `seek_at` itself is not.
//!   Hotplug notices are applied on every call.
//! - One setup attempt is made per scan per candidate.
//! - A troubled identity is ignored until it is physically reconnected: it
//!   shows up with a different [`NativeHandle`], or it drops out of an
//!   enumeration (or is reported detached) and later reappears.
//! - A device that fails mid-poll is closed, quarantined and forgotten without
//!   touching its siblings.
//! - [`SeekerEvent::AmbiguityChanged`] fires only when the number of distinct
//!   USB / Bluetooth transports among active sessions crosses 1.
//!
//! All table mutation happens on the thread calling `seek_at` / `poll_at`.

use crate::config::{PressableConfig, SeekerConfig};
use crate::device::Device;
use crate::error::{ConfigError, SeekerError, SetupError, SourceError};
use crate::event::{ForgetReason, SeekerEvent};
use crate::hotplug::{HotplugNotice, HotplugNotifier};
use crate::peripheral::{NativeHandle, PeripheralId, PeripheralInfo, TargetFilter, Transport};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Vendor enumeration + setup boundary.
pub trait PeripheralSource: Send {
    /// Short label used in logs (`"hid"`, `"xinput"`, `"virtual"`).
    fn name(&self) -> &str;

    /// Peripherals currently present.
    fn enumerate(&mut self) -> Result<Vec<PeripheralInfo>, SourceError>;

    /// Open the peripheral and wrap it into a device.
    fn setup(
        &mut self,
        info: &PeripheralInfo,
        pressable: &PressableConfig,
    ) -> Result<Box<dyn Device>, SetupError>;

    /// Release source-owned resources. Called once when the seeker closes.
    fn close(&mut self) {}
}

/// Object-safe seeker surface used by [`Manager`](crate::manager::Manager).
pub trait DeviceSeeker: Send {
    fn name(&self) -> &str;
    fn seek_at(&mut self, now: Instant) -> Result<Vec<SeekerEvent>, SeekerError>;
    fn poll_at(&mut self, now: Instant) -> Result<Vec<SeekerEvent>, SeekerError>;
    fn is_ambiguous(&self) -> bool;
    fn active(&self) -> Vec<PeripheralId>;
    fn device_mut(&mut self, id: &PeripheralId) -> Option<&mut (dyn Device + 'static)>;
    fn close_at(&mut self, now: Instant) -> Vec<SeekerEvent>;
}

struct Session {
    info: PeripheralInfo,
    device: Box<dyn Device>,
}

struct Candidate {
    handle: NativeHandle,
    attempts_left: u32,
}

pub struct Seeker<S: PeripheralSource> {
    source: S,
    targets: Vec<TargetFilter>,
    config: SeekerConfig,
    pressable: PressableConfig,
    sessions: BTreeMap<PeripheralId, Session>,
    candidates: HashMap<PeripheralId, Candidate>,
    troubled: HashMap<PeripheralId, NativeHandle>,
    last_scan: Option<Instant>,
    ambiguous: bool,
    notice_tx: Sender<HotplugNotice>,
    notice_rx: Receiver<HotplugNotice>,
    stashed: Vec<SeekerEvent>,
    closed: bool,
}

impl<S: PeripheralSource> Seeker<S> {
    /// Fails fast on an invalid configuration.
    pub fn new(source: S, config: SeekerConfig) -> Result<Self, ConfigError> {
        Self::with_pressable_config(source, config, PressableConfig::default())
    }

    pub fn with_pressable_config(
        source: S,
        config: SeekerConfig,
        pressable: PressableConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        pressable.validate()?;
        let (notice_tx, notice_rx) = unbounded();
        Ok(Self {
            source,
            targets: Vec::new(),
            config,
            pressable,
            sessions: BTreeMap::new(),
            candidates: HashMap::new(),
            troubled: HashMap::new(),
            last_scan: None,
            ambiguous: false,
            notice_tx,
            notice_rx,
            stashed: Vec::new(),
            closed: false,
        })
    }

    /// Builder-style [`add_target`](Self::add_target).
    pub fn with_target(mut self, target: TargetFilter) -> Self {
        self.add_target(target);
        self
    }

    /// Only peripherals matching one of the targets are considered.
    /// With no targets every enumerated peripheral matches.
    pub fn add_target(&mut self, target: TargetFilter) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub fn targets(&self) -> &[TargetFilter] {
        &self.targets
    }

    pub fn config(&self) -> &SeekerConfig {
        &self.config
    }

    /// Sender for vendor callback threads.
    pub fn notifier(&self) -> HotplugNotifier {
        HotplugNotifier::new(self.notice_tx.clone())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn is_active(&self, id: &PeripheralId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn is_troubled(&self, id: &PeripheralId) -> bool {
        self.troubled.contains_key(id)
    }

    /// Remaining setup attempts of a candidate that has failed at least once.
    pub fn attempts_left(&self, id: &PeripheralId) -> Option<u32> {
        self.candidates.get(id).map(|c| c.attempts_left)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Active devices in identity order.
    pub fn devices(&self) -> impl Iterator<Item = (&PeripheralId, &dyn Device)> + '_ {
        self.sessions
            .iter()
            .map(|(id, s)| (id, s.device.as_ref() as &dyn Device))
    }

    /// Apply hotplug notices, run a governed scan if one is due, and update ambiguity.
    pub fn seek_at(&mut self, now: Instant) -> Result<Vec<SeekerEvent>, SeekerError> {
        if self.closed {
            return Err(SeekerError::Closed);
        }
        let mut events = std::mem::take(&mut self.stashed);
        self.ingest(now, &mut events)?;

        if self.scan_due(now) {
            self.last_scan = Some(now);
            let present = match self.source.enumerate() {
                Ok(present) => present,
                Err(err) => {
                    warn!(source = self.source.name(), error = %err, "enumeration failed");
                    self.update_ambiguity(now, &mut events);
                    self.stashed = events;
                    return Err(err.into());
                }
            };
            self.scan(present, now, &mut events);
        }

        self.update_ambiguity(now, &mut events);
        Ok(events)
    }

    pub fn seek(&mut self) -> Result<Vec<SeekerEvent>, SeekerError> {
        self.seek_at(Instant::now())
    }

    /// Poll every active device. A failing device is quarantined; the rest are still polled.
    pub fn poll_at(&mut self, now: Instant) -> Result<Vec<SeekerEvent>, SeekerError> {
        if self.closed {
            return Err(SeekerError::Closed);
        }
        let mut events = std::mem::take(&mut self.stashed);
        self.ingest(now, &mut events)?;

        let mut faulted = Vec::new();
        for (id, session) in &mut self.sessions {
            match session.device.poll_at(now) {
                Ok(device_events) => {
                    events.extend(device_events.into_iter().map(|event| SeekerEvent::Device {
                        peripheral: id.clone(),
                        event,
                    }));
                }
                Err(err) => faulted.push((id.clone(), err.to_string())),
            }
        }
        for (id, message) in faulted {
            if let Some(mut session) = self.sessions.remove(&id) {
                warn!(peripheral = %id, error = %message, "device faulted while polling; quarantined");
                session.device.close();
                self.troubled.insert(id.clone(), session.info.handle);
                events.push(SeekerEvent::Forgotten {
                    peripheral: id,
                    reason: ForgetReason::Troubled(message),
                    at: now,
                });
            }
        }

        self.update_ambiguity(now, &mut events);
        Ok(events)
    }

    pub fn poll(&mut self) -> Result<Vec<SeekerEvent>, SeekerError> {
        self.poll_at(Instant::now())
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    pub fn device_mut(&mut self, id: &PeripheralId) -> Option<&mut (dyn Device + 'static)> {
        self.sessions.get_mut(id).map(|s| s.device.as_mut())
    }

    /// Close every device and the source. Returns one `Forgotten(Closed)` per
    /// session; a second call returns nothing.
    pub fn close_at(&mut self, now: Instant) -> Vec<SeekerEvent> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let mut events = Vec::new();
        for (id, mut session) in std::mem::take(&mut self.sessions) {
            session.device.close();
            events.push(SeekerEvent::Forgotten {
                peripheral: id,
                reason: ForgetReason::Closed,
                at: now,
            });
        }
        self.candidates.clear();
        self.stashed.clear();
        self.update_ambiguity(now, &mut events);
        self.source.close();
        debug!(source = self.source.name(), "seeker closed");
        events
    }

    pub fn close(&mut self) {
        self.close_at(Instant::now());
    }

    fn scan_due(&self, now: Instant) -> bool {
        self.last_scan.map_or(true, |last| {
            now.saturating_duration_since(last) >= self.config.scan_interval()
        })
    }

    fn matches(&self, id: &PeripheralId) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t.matches(id))
    }

    /// Drain hotplug notices. A captured callback failure is re-raised after the
    /// remaining notices are applied; events produced so far are kept for the next call.
    fn ingest(&mut self, now: Instant, events: &mut Vec<SeekerEvent>) -> Result<(), SeekerError> {
        let mut failure = None;
        while let Ok(notice) = self.notice_rx.try_recv() {
            match notice {
                HotplugNotice::Attached(info) => {
                    // A pending candidate is retried on the next scan, not here.
                    let pending = self
                        .candidates
                        .get(&info.id)
                        .is_some_and(|c| c.handle == info.handle);
                    if self.matches(&info.id) && !pending {
                        self.consider(info, now, events);
                    }
                }
                HotplugNotice::Detached(id) => {
                    self.candidates.remove(&id);
                    self.troubled.remove(&id);
                    self.forget(&id, ForgetReason::Disconnected, now, events);
                }
                HotplugNotice::Failed(message) => {
                    warn!(source = self.source.name(), error = %message, "hotplug callback failed");
                    failure.get_or_insert(message);
                }
            }
        }
        match failure {
            Some(message) => {
                self.update_ambiguity(now, events);
                self.stashed = std::mem::take(events);
                Err(SeekerError::Callback(message))
            }
            None => Ok(()),
        }
    }

    fn scan(&mut self, present: Vec<PeripheralInfo>, now: Instant, events: &mut Vec<SeekerEvent>) {
        let present: Vec<_> = present
            .into_iter()
            .filter(|info| self.matches(&info.id))
            .collect();
        let seen: HashSet<PeripheralId> = present.iter().map(|i| i.id.clone()).collect();

        let gone: Vec<_> = self
            .sessions
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in gone {
            self.forget(&id, ForgetReason::Disconnected, now, events);
        }
        self.candidates.retain(|id, _| seen.contains(id));
        // Dropping out of enumeration is a physical disconnect: the next
        // appearance starts over even if the OS hands out the same handle.
        self.troubled.retain(|id, _| {
            let present = seen.contains(id);
            if !present {
                debug!(peripheral = %id, "quarantined peripheral disconnected");
            }
            present
        });

        for info in present {
            self.consider(info, now, events);
        }
    }

    fn consider(&mut self, info: PeripheralInfo, now: Instant, events: &mut Vec<SeekerEvent>) {
        let id = info.id.clone();

        if let Some(session) = self.sessions.get(&id) {
            if session.info.handle == info.handle {
                return;
            }
            debug!(peripheral = %id, "native handle changed; re-creating session");
            self.forget(&id, ForgetReason::Disconnected, now, events);
        }

        match self.troubled.get(&id) {
            Some(handle) if *handle == info.handle => return,
            Some(_) => {
                info!(peripheral = %id, "peripheral reconnected with a new handle; quarantine lifted");
                self.troubled.remove(&id);
            }
            None => {}
        }

        let budget = self.config.setup_attempts;
        let candidate = self.candidates.entry(id.clone()).or_insert(Candidate {
            handle: info.handle,
            attempts_left: budget,
        });
        if candidate.handle != info.handle {
            candidate.handle = info.handle;
            candidate.attempts_left = budget;
        }

        debug!(
            peripheral = %id,
            transport = info.transport.as_str(),
            attempts_left = candidate.attempts_left,
            "setting up peripheral"
        );
        match self.source.setup(&info, &self.pressable) {
            Ok(device) => {
                self.candidates.remove(&id);
                info!(peripheral = %id, transport = info.transport.as_str(), "peripheral discovered");
                events.push(SeekerEvent::Discovered {
                    peripheral: id.clone(),
                    name: device.name().to_string(),
                    transport: info.transport,
                    at: now,
                });
                self.sessions.insert(id, Session { info, device });
            }
            Err(SetupError::Recoverable(message)) => {
                let left = match self.candidates.get_mut(&id) {
                    Some(c) => {
                        c.attempts_left = c.attempts_left.saturating_sub(1);
                        c.attempts_left
                    }
                    None => 0,
                };
                if left == 0 {
                    self.quarantine(id, info.handle, message, now, events);
                } else {
                    debug!(peripheral = %id, attempts_left = left, error = %message, "setup failed; will retry");
                }
            }
            Err(SetupError::Fatal(message)) => {
                self.quarantine(id, info.handle, message, now, events);
            }
        }
    }

    fn quarantine(
        &mut self,
        id: PeripheralId,
        handle: NativeHandle,
        message: String,
        now: Instant,
        events: &mut Vec<SeekerEvent>,
    ) {
        warn!(peripheral = %id, error = %message, "setup attempts exhausted; quarantined");
        self.candidates.remove(&id);
        self.troubled.insert(id.clone(), handle);
        events.push(SeekerEvent::Forgotten {
            peripheral: id,
            reason: ForgetReason::Troubled(message),
            at: now,
        });
    }

    fn forget(
        &mut self,
        id: &PeripheralId,
        reason: ForgetReason,
        now: Instant,
        events: &mut Vec<SeekerEvent>,
    ) {
        if let Some(mut session) = self.sessions.remove(id) {
            info!(peripheral = %id, "peripheral forgotten");
            session.device.close();
            events.push(SeekerEvent::Forgotten {
                peripheral: id.clone(),
                reason,
                at: now,
            });
        }
    }

    fn update_ambiguity(&mut self, now: Instant, events: &mut Vec<SeekerEvent>) {
        let transports: BTreeSet<Transport> = self
            .sessions
            .values()
            .map(|s| s.info.transport)
            .filter(|t| t.is_ambiguity_relevant())
            .collect();
        let ambiguous = transports.len() > 1;
        if ambiguous != self.ambiguous {
            self.ambiguous = ambiguous;
            if ambiguous {
                warn!(source = self.source.name(), "same device visible over several transports");
            } else {
                info!(source = self.source.name(), "transport ambiguity resolved");
            }
            events.push(SeekerEvent::AmbiguityChanged { ambiguous, at: now });
        }
    }
}

impl<S: PeripheralSource> DeviceSeeker for Seeker<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn seek_at(&mut self, now: Instant) -> Result<Vec<SeekerEvent>, SeekerError> {
        Seeker::seek_at(self, now)
    }

    fn poll_at(&mut self, now: Instant) -> Result<Vec<SeekerEvent>, SeekerError> {
        Seeker::poll_at(self, now)
    }

    fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    fn active(&self) -> Vec<PeripheralId> {
        self.sessions.keys().cloned().collect()
    }

    fn device_mut(&mut self, id: &PeripheralId) -> Option<&mut (dyn Device + 'static)> {
        Seeker::device_mut(self, id)
    }

    fn close_at(&mut self, now: Instant) -> Vec<SeekerEvent> {
        Seeker::close_at(self, now)
    }
}

impl<S: PeripheralSource> Drop for Seeker<S> {
    fn drop(&mut self) {
        self.close();
    }
}
