//! Optional background poll worker.
//!
//! Hosts that do not want to drive `poll()` themselves hand devices to a
//! [`PollWorker`]. One thread polls every device at
//! [`WorkerConfig::poll_interval`] and forwards the resulting events on a
//! `crossbeam` channel.
//!
//! - The device set sits behind a single mutex; `add`, `remove` and
//!   `with_device` take the same lock as the poll pass.
//! - The thread starts on the first `add` and exits once the set is empty. A
//!   later `add` starts a fresh one.
//! - A device whose poll fails is closed, removed and reported as
//!   [`WorkerEvent::Faulted`]. Its siblings keep being polled.
//! - Dropping the worker stops the thread, joins it and closes what is left.

use crate::config::WorkerConfig;
use crate::device::Device;
use crate::error::{ConfigError, DeviceError};
use crate::event::DeviceEvent;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Handle of one device inside a [`PollWorker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerKey(u64);

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    Device {
        key: WorkerKey,
        device: String,
        event: DeviceEvent,
    },
    /// The device was closed and dropped from the set.
    Faulted {
        key: WorkerKey,
        device: String,
        error: DeviceError,
    },
}

#[derive(Default)]
struct DeviceSet {
    devices: Vec<(WorkerKey, Box<dyn Device>)>,
    next_key: u64,
    running: bool,
    stopping: bool,
}

struct Shared {
    set: Mutex<DeviceSet>,
    events: Sender<WorkerEvent>,
}

pub struct PollWorker {
    shared: Arc<Shared>,
    interval: Duration,
    thread: Mutex<Option<JoinHandle<()>>>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    events_rx: Receiver<WorkerEvent>,
}

impl PollWorker {
    pub fn new(config: &WorkerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events, events_rx) = channel::unbounded();
        let (stop_tx, stop_rx) = channel::unbounded();
        Ok(Self {
            shared: Arc::new(Shared {
                set: Mutex::new(DeviceSet::default()),
                events,
            }),
            interval: config.poll_interval(),
            thread: Mutex::new(None),
            stop_tx,
            stop_rx,
            events_rx,
        })
    }

    /// Receiving end of the event channel. Clones share one queue.
    pub fn events(&self) -> Receiver<WorkerEvent> {
        self.events_rx.clone()
    }

    /// Hand `device` to the worker, starting the thread if it is idle.
    pub fn add(&self, device: Box<dyn Device>) -> std::io::Result<WorkerKey> {
        let mut set = self.shared.set.lock();
        set.next_key += 1;
        let key = WorkerKey(set.next_key);
        debug!(device = device.id(), ?key, "device handed to poll worker");
        set.devices.push((key, device));

        if !set.running {
            let mut thread = self.thread.lock();
            // A previous thread saw the set empty and is on its way out.
            if let Some(old) = thread.take() {
                let _ = old.join();
            }
            let shared = Arc::clone(&self.shared);
            let stop = self.stop_rx.clone();
            let interval = self.interval;
            let handle = std::thread::Builder::new()
                .name("stickup-poll".into())
                .spawn(move || run(shared, stop, interval));
            match handle {
                Ok(handle) => {
                    set.running = true;
                    *thread = Some(handle);
                    info!("poll worker started");
                }
                Err(err) => {
                    if let Some((_, mut device)) = set.devices.pop() {
                        device.close();
                    }
                    return Err(err);
                }
            }
        }
        Ok(key)
    }

    /// Take a device back out of the worker, unclosed.
    pub fn remove(&self, key: WorkerKey) -> Option<Box<dyn Device>> {
        let mut set = self.shared.set.lock();
        let index = set.devices.iter().position(|(k, _)| *k == key)?;
        Some(set.devices.remove(index).1)
    }

    /// Run `f` on a device between two poll passes.
    pub fn with_device<T>(&self, key: WorkerKey, f: impl FnOnce(&mut dyn Device) -> T) -> Option<T> {
        let mut set = self.shared.set.lock();
        let (_, device) = set.devices.iter_mut().find(|(k, _)| *k == key)?;
        Some(f(device.as_mut()))
    }

    pub fn len(&self) -> usize {
        self.shared.set.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.shared.set.lock().running
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.shared.set.lock().stopping = true;
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        let mut set = self.shared.set.lock();
        for (_, device) in set.devices.iter_mut() {
            device.close();
        }
        set.devices.clear();
        set.running = false;
    }
}

fn run(shared: Arc<Shared>, stop: Receiver<()>, interval: Duration) {
    loop {
        let mut out = Vec::new();
        {
            let mut set = shared.set.lock();
            if set.stopping || set.devices.is_empty() {
                set.running = false;
                break;
            }
            poll_pass(&mut set, Instant::now(), &mut out);
        }
        for event in out {
            // Nobody listening is not an error for the worker.
            let _ = shared.events.send(event);
        }
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                shared.set.lock().running = false;
                break;
            }
        }
    }
    debug!("poll worker stopped");
}

fn poll_pass(set: &mut DeviceSet, now: Instant, out: &mut Vec<WorkerEvent>) {
    set.devices.retain_mut(|(key, device)| match device.poll_at(now) {
        Ok(events) => {
            out.extend(events.into_iter().map(|event| WorkerEvent::Device {
                key: *key,
                device: device.id().to_string(),
                event,
            }));
            true
        }
        Err(error) => {
            warn!(device = device.id(), %error, "device faulted, dropping it");
            device.close();
            out.push(WorkerEvent::Faulted {
                key: *key,
                device: device.id().to_string(),
                error,
            });
            false
        }
    });
}
