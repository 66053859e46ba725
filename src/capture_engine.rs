//! Streaming capture engine.
//!
//! The analyzer announces each capture with a `$FALADATA` header line, then
//! streams the raw sample bytes once the host acknowledges with `"+"`. The
//! engine consumes read-ready events from the surrounding loop, reassembles
//! the chunked stream into one contiguous buffer, and hands the pre- and
//! post-trigger segments to a [`DatafeedSink`] as framed packets, re-arming
//! itself for the next capture.

use crate::header::{parse_header, HeaderParseError, MIN_HEADER_LEN};
use crate::serial_link::ByteLink;
use std::collections::TryReserveError;
use std::io;
use std::time::Duration;

/// Host → device byte requesting the sample stream after a header.
pub const START_CAPTURE_BYTE: &[u8] = b"+";

/// Upper bound on bytes consumed per read event.
const READ_CHUNK: usize = 1024;

const HEADER_READ_TIMEOUT: Duration = Duration::from_millis(10);
const SAMPLE_READ_TIMEOUT: Duration = Duration::from_millis(10);
const HANDSHAKE_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Consumer of one capture's packet sequence.
///
/// Per completed cycle the engine calls, in order: [`frame_begin`], one
/// [`samplerate`] notification, zero or two [`logic`] packets with an
/// optional [`trigger`] marker between them, then [`frame_end`]. Sample
/// views are only valid for the duration of the call.
///
/// [`frame_begin`]: DatafeedSink::frame_begin
/// [`samplerate`]: DatafeedSink::samplerate
/// [`logic`]: DatafeedSink::logic
/// [`trigger`]: DatafeedSink::trigger
/// [`frame_end`]: DatafeedSink::frame_end
pub trait DatafeedSink {
    /// A new capture frame is starting.
    fn frame_begin(&mut self);

    /// Sample rate of the frame that just began, in Hz.
    fn samplerate(&mut self, rate: u32);

    /// One segment of logic samples. `unit_size` is the bytes per sample row.
    fn logic(&mut self, samples: &[u8], unit_size: usize);

    /// Position-only trigger marker between the pre and post segments.
    fn trigger(&mut self);

    /// The current capture frame is complete.
    fn frame_end(&mut self);
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("malformed capture header: {0}")]
    Header(#[from] HeaderParseError),

    #[error("short capture header: {len} bytes, need at least {min}", min = MIN_HEADER_LEN)]
    ShortHeader { len: usize },

    #[error("sample buffer allocation of {bytes} bytes failed: {source}")]
    Allocation {
        bytes: usize,
        source: TryReserveError,
    },

    #[error("serial read failed: {0}")]
    LinkRead(#[source] io::Error),

    #[error("serial write failed: {0}")]
    LinkWrite(#[source] io::Error),

    #[error("capture handshake rejected: wrote {written} of 1 byte")]
    HandshakeRejected { written: usize },
}

/// Outcome of one read-ready event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// The link was idle; nothing changed.
    Idle,
    /// A capture is in flight (header accepted or samples still arriving).
    Streaming,
    /// A full frame was emitted; the engine is re-armed for the next header.
    FrameComplete,
}

/// State for one capture-to-completion cycle, reused in place for the next.
///
/// `transfer_count == 0` means the next bytes are a header; afterwards they
/// are sample data. The sample buffer exists only between header acceptance
/// and frame emission and is sized exactly once, never resized.
#[derive(Debug)]
pub struct CaptureEngine {
    sample_rate: u32,
    channel_count: u32,
    sample_limit: u64,
    pre_trigger_limit: u64,
    trigger_channel_mask: u32,
    trigger_value_mask: u32,
    unit_size: usize,
    received_count: u64,
    transfer_count: u32,
    sample_buf: Option<Vec<u8>>,
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEngine {
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            channel_count: 0,
            sample_limit: 0,
            pre_trigger_limit: 0,
            trigger_channel_mask: 0,
            trigger_value_mask: 0,
            // One byte per sample row; up to 8 channels pack into it.
            unit_size: 1,
            received_count: 0,
            transfer_count: 0,
            sample_buf: None,
        }
    }

    /// Drive one read-ready event.
    ///
    /// Never blocks beyond the bounded per-event read waits, so the caller's
    /// event loop stays responsive. Every `Err` is fatal: the caller's only
    /// recovery is to stop the acquisition. No retries happen here.
    pub fn on_read_ready(
        &mut self,
        link: &mut dyn ByteLink,
        sink: &mut dyn DatafeedSink,
    ) -> Result<EngineStatus, CaptureError> {
        if self.transfer_count == 0 {
            self.begin_cycle(link, sink)
        } else {
            self.pump_samples(link, sink)
        }
    }

    /// Abandon the cycle in flight: drop any partial buffer, emit nothing.
    pub fn reset(&mut self) {
        self.received_count = 0;
        self.transfer_count = 0;
        self.sample_buf = None;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn sample_limit(&self) -> u64 {
        self.sample_limit
    }

    pub fn trigger_channel_mask(&self) -> u32 {
        self.trigger_channel_mask
    }

    pub fn trigger_value_mask(&self) -> u32 {
        self.trigger_value_mask
    }

    /// Samples placed into the buffer so far in this cycle.
    pub fn received_samples(&self) -> u64 {
        self.received_count
    }

    /// Read events seen in this cycle. Diagnostic only.
    pub fn transfer_count(&self) -> u32 {
        self.transfer_count
    }

    pub fn is_streaming(&self) -> bool {
        self.transfer_count > 0
    }

    fn begin_cycle(
        &mut self,
        link: &mut dyn ByteLink,
        sink: &mut dyn DatafeedSink,
    ) -> Result<EngineStatus, CaptureError> {
        let mut buf = [0u8; READ_CHUNK];
        let len = link
            .read_chunk(&mut buf, HEADER_READ_TIMEOUT)
            .map_err(CaptureError::LinkRead)?;
        if len == 0 {
            return Ok(EngineStatus::Idle);
        }
        if len < MIN_HEADER_LEN {
            log::error!("bad header: only {len} bytes");
            return Err(CaptureError::ShortHeader { len });
        }
        let hd = parse_header(&buf[..len]).inspect_err(|e| log::error!("bad header: {e}"))?;

        self.sample_rate = hd.sample_rate;
        self.channel_count = hd.channel_count;
        self.sample_limit = u64::from(hd.sample_count);
        self.pre_trigger_limit = u64::from(hd.pre_trigger_count);
        self.trigger_channel_mask = hd.trigger_channel_mask;
        self.trigger_value_mask = hd.trigger_value_mask;

        let bytes = hd.sample_count as usize * self.unit_size;
        let mut samples: Vec<u8> = Vec::new();
        samples
            .try_reserve_exact(bytes)
            .map_err(|source| CaptureError::Allocation { bytes, source })?;
        samples.resize(bytes, 0);
        self.sample_buf = Some(samples);

        sink.frame_begin();
        sink.samplerate(self.sample_rate);

        let written = link
            .write_chunk(START_CAPTURE_BYTE, HANDSHAKE_WRITE_TIMEOUT)
            .map_err(CaptureError::LinkWrite)?;
        if written != START_CAPTURE_BYTE.len() {
            return Err(CaptureError::HandshakeRejected { written });
        }

        // Next event carries sample data.
        self.transfer_count = 1;
        Ok(EngineStatus::Streaming)
    }

    fn pump_samples(
        &mut self,
        link: &mut dyn ByteLink,
        sink: &mut dyn DatafeedSink,
    ) -> Result<EngineStatus, CaptureError> {
        self.transfer_count += 1;

        // A trailing event can race the cycle reset; also covers a header
        // that declared zero samples.
        if self.received_count >= self.sample_limit {
            return Ok(EngineStatus::Streaming);
        }

        let mut chunk = [0u8; READ_CHUNK];
        let len = link
            .read_chunk(&mut chunk, SAMPLE_READ_TIMEOUT)
            .map_err(|e| {
                log::error!("serial read failed mid-capture: {e}");
                CaptureError::LinkRead(e)
            })?;
        if len == 0 {
            return Ok(EngineStatus::Streaming);
        }

        if let Some(buf) = self.sample_buf.as_mut() {
            // The device streams its capture memory newest sample first, so
            // the buffer fills back to front; index 0 ends up holding the
            // oldest sample. That is what lets the pre/post split below run
            // without a second copy pass.
            for &sample in &chunk[..len] {
                let offset =
                    (self.sample_limit - self.received_count - 1) as usize * self.unit_size;
                buf[offset] = sample;
                self.received_count += 1;
                if self.received_count == self.sample_limit {
                    break;
                }
            }
        }

        if self.received_count == self.sample_limit {
            // Bytes left in this chunk, if any, are dropped along with
            // whatever is still queued on the link.
            self.finish_cycle(link, sink);
            return Ok(EngineStatus::FrameComplete);
        }
        Ok(EngineStatus::Streaming)
    }

    /// Trigger segmentation and emission. Fires exactly once per completed
    /// cycle, then re-arms for the next header.
    fn finish_cycle(&mut self, link: &mut dyn ByteLink, sink: &mut dyn DatafeedSink) {
        let samples = self.sample_buf.take().unwrap_or_default();
        let unit = self.unit_size;
        let pre = self.pre_trigger_limit.min(self.sample_limit) as usize * unit;

        if self.trigger_channel_mask != 0 {
            if pre > 0 {
                sink.logic(&samples[..pre], unit);
            }
            sink.trigger();
        }
        sink.logic(&samples[pre..], unit);
        sink.frame_end();

        self.received_count = 0;
        self.transfer_count = 0;
        let _ = link.discard_input();
    }
}

/// One event as seen by a [`FrameRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    FrameBegin,
    Samplerate(u32),
    Logic { samples: Vec<u8>, unit_size: usize },
    Trigger,
    FrameEnd,
}

/// Sink that records the packet sequence, owning copies of the sample views.
///
/// Handy for tests and for post-processing a finished frame (see
/// [`crate::dataframe::LogicCapture`]).
#[derive(Debug, Default)]
pub struct FrameRecorder {
    events: Vec<FrameEvent>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[FrameEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<FrameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Completed frames, each running from its frame-begin marker through its
    /// frame-end marker. A frame still in flight is not included.
    pub fn frames(&self) -> impl Iterator<Item = &[FrameEvent]> {
        self.events
            .split_inclusive(|e| matches!(e, FrameEvent::FrameEnd))
            .filter(|f| matches!(f.last(), Some(FrameEvent::FrameEnd)))
    }
}

impl DatafeedSink for FrameRecorder {
    fn frame_begin(&mut self) {
        self.events.push(FrameEvent::FrameBegin);
    }

    fn samplerate(&mut self, rate: u32) {
        self.events.push(FrameEvent::Samplerate(rate));
    }

    fn logic(&mut self, samples: &[u8], unit_size: usize) {
        self.events.push(FrameEvent::Logic {
            samples: samples.to_vec(),
            unit_size,
        });
    }

    fn trigger(&mut self) {
        self.events.push(FrameEvent::Trigger);
    }

    fn frame_end(&mut self) {
        self.events.push(FrameEvent::FrameEnd);
    }
}
