//! HID report adapter.
//!
//! [`ReportAdapter`] wraps a [`ReportReader`] (an open HID handle or a test
//! double) and a [`ReportLayout`] (which bytes mean what). It is responsible for:
//! - draining a bounded number of reports per poll, keeping the latest one the
//!   layout accepts,
//! - tracking whether the handle is still usable, and
//! - turning rumble / lightbar requests into output reports.
//!
//! It does not interpret report bytes itself; all decoding lives in the
//! layout's feature updaters.

use crate::adapter::DeviceAdapter;
use crate::catalog::gamepad;
use crate::error::DeviceError;
use crate::feature::StateCell;
use crate::registry::MappedFeatureRegistry;
use crate::state::{LedState, RumbleState};

/// Maximum number of reports drained per poll.
///
/// Keeps one chatty device from starving the rest of the loop when it produces
/// data faster than the host polls.
pub const MAX_REPORTS_PER_TICK: usize = 32;

/// Byte transport under a [`ReportAdapter`].
pub trait ReportReader: Send + 'static {
    /// Non-blocking read of one report into `buf`. `Ok(0)` means nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    fn write(&mut self, report: &[u8]) -> Result<usize, DeviceError>;

    fn close(&mut self) {}
}

/// Latest accepted input report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportRaw {
    /// Report bytes, report id first.
    pub bytes: Vec<u8>,
    /// Input reports accepted since the adapter was opened.
    pub accepted: u64,
}

impl ReportRaw {
    /// `0` past the end of a short report.
    pub fn byte(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    pub fn bit(&self, index: usize, mask: u8) -> bool {
        self.byte(index) & mask != 0
    }

    pub fn i16_le(&self, index: usize) -> i16 {
        i16::from_le_bytes([self.byte(index), self.byte(index + 1)])
    }
}

/// Pending output values handed to [`ReportLayout::output_report`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OutputRequest {
    pub strong: f32,
    pub weak: f32,
    pub rgb: [u8; 3],
}

/// Byte layout of one device family on one transport.
pub trait ReportLayout: Send + 'static {
    /// Read buffer size, report id included.
    fn input_len(&self) -> usize;

    /// Whether `report` carries input state this layout decodes.
    fn accepts(&self, report: &[u8]) -> bool;

    /// Declare the input features.
    fn map_features(
        &self,
        registry: &mut MappedFeatureRegistry<ReportRaw>,
    ) -> Result<(), DeviceError>;

    /// Output report for rumble + lightbar, when the device has one.
    fn output_report(&self, _request: &OutputRequest) -> Option<Vec<u8>> {
        None
    }
}

struct Outputs {
    strong: StateCell<RumbleState>,
    weak: StateCell<RumbleState>,
    lightbar: StateCell<LedState>,
}

pub struct ReportAdapter<R: ReportReader, L: ReportLayout> {
    reader: R,
    layout: L,
    buf: Vec<u8>,
    raw: ReportRaw,
    outputs: Option<Outputs>,
    connected: bool,
    closed: bool,
}

impl<R: ReportReader, L: ReportLayout> ReportAdapter<R, L> {
    pub fn new(reader: R, layout: L) -> Self {
        let buf = vec![0u8; layout.input_len()];
        Self {
            reader,
            layout,
            buf,
            raw: ReportRaw::default(),
            outputs: None,
            connected: true,
            closed: false,
        }
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        for _ in 0..MAX_REPORTS_PER_TICK {
            let n = match self.reader.read(&mut self.buf) {
                Ok(0) => break,
                Ok(n) => n.min(self.buf.len()),
                Err(err) => {
                    self.connected = false;
                    return Err(err);
                }
            };
            let report = &self.buf[..n];
            if self.layout.accepts(report) {
                self.raw.bytes.clear();
                self.raw.bytes.extend_from_slice(report);
                self.raw.accepted += 1;
            }
        }
        Ok(())
    }

    fn flush_outputs(&mut self) -> Result<(), DeviceError> {
        let Some(outputs) = &self.outputs else {
            return Ok(());
        };
        let pending = [
            outputs.strong.write().take_request().is_some(),
            outputs.weak.write().take_request().is_some(),
            outputs.lightbar.write().take_request().is_some(),
        ];
        if !pending.contains(&true) {
            return Ok(());
        }
        let request = OutputRequest {
            strong: outputs.strong.read().strength,
            weak: outputs.weak.read().strength,
            rgb: outputs.lightbar.read().rgb,
        };
        if let Some(report) = self.layout.output_report(&request) {
            self.reader.write(&report)?;
        }
        Ok(())
    }
}

impl<R: ReportReader, L: ReportLayout> DeviceAdapter for ReportAdapter<R, L> {
    type Raw = ReportRaw;

    fn init_adapter(
        &mut self,
        registry: &mut MappedFeatureRegistry<ReportRaw>,
    ) -> Result<(), DeviceError> {
        self.layout.map_features(registry)?;
        if self.layout.output_report(&OutputRequest::default()).is_some() {
            self.outputs = Some(Outputs {
                strong: registry.map_feature(&gamepad::RUMBLE_STRONG, (), |_, _, _| {})?,
                weak: registry.map_feature(&gamepad::RUMBLE_WEAK, (), |_, _, _| {})?,
                lightbar: registry.map_feature(&gamepad::LIGHTBAR, (), |_, _, _| {})?,
            });
        } else {
            registry.declare_absent(&gamepad::RUMBLE_STRONG);
            registry.declare_absent(&gamepad::RUMBLE_WEAK);
            registry.declare_absent(&gamepad::LIGHTBAR);
        }
        Ok(())
    }

    fn poll_device(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        self.drain()?;
        self.flush_outputs()
    }

    fn raw(&self) -> &ReportRaw {
        &self.raw
    }

    fn is_device_connected(&self) -> bool {
        self.connected && !self.closed
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.reader.close();
        }
    }
}
