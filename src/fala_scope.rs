use crate::capture_engine::{CaptureEngine, CaptureError, DatafeedSink, EngineStatus};
use crate::fala_connector::{FalaConnector, FalaConnectorError, FalaDevice};
use crate::header::CaptureHeader;
use crate::serial_link::{FalaLink, FalaLinkError};

/// Smallest sample limit the device accepts.
pub const MIN_SAMPLE_LIMIT: u64 = 4;

/// Channel names as printed on the PCB silkscreen.
pub const DEFAULT_CHANNEL_NAMES: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7"];

#[derive(Debug, thiserror::Error)]
pub enum FalaScopeError {
    #[error("Serial link error: {0}")]
    Link(#[from] FalaLinkError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Sample limit {requested} is below the device minimum of {min}", min = MIN_SAMPLE_LIMIT)]
    SampleLimitTooSmall { requested: u64 },
}

fn default_channel_names(count: u32) -> Vec<String> {
    (0..count as usize)
        .map(|i| {
            DEFAULT_CHANNEL_NAMES
                .get(i)
                .map_or_else(|| i.to_string(), ToString::to_string)
        })
        .collect()
}

/// Apply a comma-separated rename spec, e.g. `"sda,scl,,cs"`. Empty fields
/// keep the default, surplus fields are ignored.
fn apply_channel_name_overrides(names: &mut [String], spec: &str) {
    for (name, new) in names.iter_mut().zip(spec.split(',')) {
        let new = new.trim();
        if !new.is_empty() {
            *name = new.to_string();
        }
    }
}

/// An open, idle FALA device.
///
/// Obtained from [`FalaConnector::connect`] or [`FalaScope::open`]. Holds the
/// capabilities the device reported at identification and hands itself over
/// to [`AcquiringFalaScope`] for the duration of an acquisition.
pub struct FalaScope {
    link: FalaLink,
    port: String,
    sample_rate: u32,
    channel_count: u32,
    sample_limit: u64,
    channel_names: Vec<String>,
}

impl FalaScope {
    /// Connect to any available FALA device.
    pub fn connect() -> Result<Self, FalaConnectorError> {
        FalaConnector::connect(None)
    }

    /// Open a previously discovered device for acquisition.
    pub fn open(device: &FalaDevice) -> Result<Self, FalaLinkError> {
        let link = FalaLink::open(&device.port)?;
        Ok(Self::from_parts(link, device.port.clone(), device.header))
    }

    fn from_parts(link: FalaLink, port: String, header: CaptureHeader) -> Self {
        Self {
            link,
            port,
            sample_rate: header.sample_rate,
            channel_count: header.channel_count,
            sample_limit: u64::from(header.sample_count),
            channel_names: default_channel_names(header.channel_count),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Sample rate reported by the device, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    /// Bitmask covering all logic channels.
    pub fn channel_mask(&self) -> u64 {
        1u64.checked_shl(self.channel_count)
            .map_or(u64::MAX, |m| m - 1)
    }

    /// Total samples per capture, as last reported by the device.
    pub fn sample_limit(&self) -> u64 {
        self.sample_limit
    }

    pub fn set_sample_limit(&mut self, limit: u64) -> Result<(), FalaScopeError> {
        if limit < MIN_SAMPLE_LIMIT {
            return Err(FalaScopeError::SampleLimitTooSmall { requested: limit });
        }
        self.sample_limit = limit;
        Ok(())
    }

    /// Valid sample-limit range, or `None` when the device did not report its
    /// sample memory size.
    pub fn sample_limit_range(&self) -> Option<(u64, u64)> {
        (self.sample_limit > 0).then_some((MIN_SAMPLE_LIMIT, self.sample_limit))
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Rename channels from a comma-separated spec; see the device docs for
    /// the format. Empty fields keep the silkscreen default.
    pub fn rename_channels(&mut self, spec: &str) {
        apply_channel_name_overrides(&mut self.channel_names, spec);
    }

    /// Begin continuous acquisition. Counters start zeroed, so the first
    /// bytes off the link are interpreted as a capture header.
    pub fn start_acquisition(self) -> AcquiringFalaScope {
        log::debug!("Starting acquisition on {}", self.port);
        AcquiringFalaScope {
            scope: self,
            engine: CaptureEngine::new(),
        }
    }
}

/// A FALA device with an acquisition in flight.
///
/// Feed it read-ready events with [`poll_once`]; every completed capture is
/// forwarded to the sink as one framed packet sequence, and the engine
/// re-arms for the next capture on its own. [`stop`] returns the idle scope,
/// discarding any half-filled capture without emitting partial frames.
///
/// [`poll_once`]: AcquiringFalaScope::poll_once
/// [`stop`]: AcquiringFalaScope::stop
pub struct AcquiringFalaScope {
    scope: FalaScope,
    engine: CaptureEngine,
}

impl AcquiringFalaScope {
    /// Drive one read event through the capture engine.
    ///
    /// Returns promptly (bounded reads only); call from the event loop
    /// whenever the port is read-ready, or in a plain polling loop. Any
    /// `Err` is fatal for this acquisition — [`stop`](Self::stop) is the only
    /// recovery.
    pub fn poll_once(&mut self, sink: &mut dyn DatafeedSink) -> Result<EngineStatus, CaptureError> {
        self.engine.on_read_ready(&mut self.scope.link, sink)
    }

    /// Poll until `frames` captures have been emitted.
    pub fn capture_frames(
        &mut self,
        frames: u64,
        sink: &mut dyn DatafeedSink,
    ) -> Result<(), CaptureError> {
        let mut completed = 0;
        while completed < frames {
            if self.poll_once(sink)? == EngineStatus::FrameComplete {
                completed += 1;
                log::debug!("Frame {completed}/{frames} complete");
            }
        }
        Ok(())
    }

    /// Engine state, for diagnostics.
    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    /// Stop acquiring and return the idle scope.
    ///
    /// A capture in flight is discarded without emitting its frame-end; the
    /// downstream sink never sees a partial cycle.
    pub fn stop(mut self) -> FalaScope {
        log::debug!("Stopping acquisition on {}", self.scope.port);
        // The last header seen supersedes the identification capabilities.
        if self.engine.sample_limit() > 0 {
            self.scope.sample_limit = self.engine.sample_limit();
            self.scope.sample_rate = self.engine.sample_rate();
        }
        self.engine.reset();
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_follow_the_silkscreen() {
        assert_eq!(default_channel_names(3), ["0", "1", "2"]);
        assert_eq!(default_channel_names(0), Vec::<String>::new());
        // Beyond the printed names, numbering continues.
        assert_eq!(default_channel_names(10)[9], "9");
    }

    #[test]
    fn rename_spec_keeps_defaults_for_empty_fields() {
        let mut names = default_channel_names(4);
        apply_channel_name_overrides(&mut names, "sda,scl,,cs");
        assert_eq!(names, ["sda", "scl", "2", "cs"]);
    }

    #[test]
    fn rename_spec_ignores_surplus_fields() {
        let mut names = default_channel_names(2);
        apply_channel_name_overrides(&mut names, "a,b,c,d");
        assert_eq!(names, ["a", "b"]);
    }
}
