//! Cross-thread hotplug handoff.
//!
//! Vendor bindings often report attach / detach on their own callback thread.
//! Those threads never touch a seeker's session table: they push
//! [`HotplugNotice`]s into a channel through a [`HotplugNotifier`], and the
//! seeker drains the channel on its polling thread during the next
//! `seek_at` / `poll_at`.
//!
//! A callback that fails (returns an error or panics) is reported as
//! [`HotplugNotice::Failed`]; the seeker re-raises it as
//! [`SeekerError::Callback`](crate::error::SeekerError::Callback).

use crate::peripheral::{PeripheralId, PeripheralInfo};
use crossbeam::channel::Sender;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// One notification from a vendor callback thread.
#[derive(Clone, Debug, PartialEq)]
pub enum HotplugNotice {
    Attached(PeripheralInfo),
    Detached(PeripheralId),
    Failed(String),
}

/// Cloneable sending half handed to vendor callbacks.
#[derive(Clone, Debug)]
pub struct HotplugNotifier {
    tx: Sender<HotplugNotice>,
}

impl HotplugNotifier {
    pub(crate) fn new(tx: Sender<HotplugNotice>) -> Self {
        Self { tx }
    }

    /// Returns `false` once the owning seeker is gone.
    pub fn attached(&self, info: PeripheralInfo) -> bool {
        self.tx.send(HotplugNotice::Attached(info)).is_ok()
    }

    pub fn detached(&self, id: PeripheralId) -> bool {
        self.tx.send(HotplugNotice::Detached(id)).is_ok()
    }

    pub fn failed(&self, message: impl Into<String>) -> bool {
        self.tx.send(HotplugNotice::Failed(message.into())).is_ok()
    }

    /// Run a callback body, capturing its error or panic as a `Failed` notice.
    pub fn guard<E, F>(&self, body: F)
    where
        E: Display,
        F: FnOnce(&HotplugNotifier) -> Result<(), E>,
    {
        match catch_unwind(AssertUnwindSafe(|| body(self))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.failed(err.to_string());
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "callback panicked".to_string());
                self.failed(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    #[test]
    fn guard_captures_errors_and_panics() {
        let (tx, rx) = unbounded();
        let notifier = HotplugNotifier::new(tx);

        notifier.guard(|_| Err::<(), _>("usb transfer stalled"));
        notifier.guard::<String, _>(|_| panic!("callback exploded"));
        notifier.guard::<String, _>(|n| {
            n.detached(PeripheralId::new(1, 2, "x"));
            Ok(())
        });

        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                HotplugNotice::Failed("usb transfer stalled".into()),
                HotplugNotice::Failed("callback exploded".into()),
                HotplugNotice::Detached(PeripheralId::new(1, 2, "x")),
            ]
        );
    }

    #[test]
    fn send_reports_a_dropped_receiver() {
        let (tx, rx) = unbounded();
        let notifier = HotplugNotifier::new(tx);
        drop(rx);
        assert!(!notifier.failed("nobody listening"));
    }
}
