//! # FALA RS
//!
//! A Rust library for capturing logic traces from the Bus Pirate 5+
//! follow-along logic analyzer (FALA) over its serial binary mode.
//!
//! The device announces every capture with an ASCII `$FALADATA` header line,
//! then streams the raw sample bytes once the host acknowledges with `"+"`.
//! This library parses the header, reassembles the chunked sample stream into
//! one contiguous capture, splits it at the trigger point, and forwards the
//! segments as framed packets to a sink of your choosing — re-arming itself
//! for the next capture so acquisition runs continuously.
//!
//! ## Features
//!
//! - **Device discovery**: uses `serialport` to enumerate USB serial ports
//!   and the protocol's own `"?"` handshake to identify FALA devices
//! - **Continuous acquisition**: header → sample stream → framed pre/post
//!   trigger packets, looping across captures
//! - **Pluggable sinks**: implement [`DatafeedSink`] or record frames with
//!   [`FrameRecorder`]
//! - **DataFrame output**: uses `polars` to turn a completed capture into a
//!   time-indexed DataFrame with per-channel bit columns
//! - **Type safety**: strong typing and error handling throughout
//!
//! ## Examples
//!
//! ### Discovery and a single capture
//!
//! ```rust,no_run
//! use fala_rs::{EngineStatus, FalaScope, FrameRecorder};
//!
//! let scope = FalaScope::connect()?;
//! println!(
//!     "{} channels at {} Hz on {}",
//!     scope.channel_count(),
//!     scope.sample_rate(),
//!     scope.port()
//! );
//!
//! let mut acquiring = scope.start_acquisition();
//! let mut recorder = FrameRecorder::new();
//! loop {
//!     if acquiring.poll_once(&mut recorder)? == EngineStatus::FrameComplete {
//!         break;
//!     }
//! }
//! let scope = acquiring.stop();
//! # let _ = scope;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Capture to DataFrame
//!
//! ```rust,no_run
//! use fala_rs::{FalaScope, FrameRecorder, LogicCapture};
//!
//! let scope = FalaScope::connect()?;
//! let channels = scope.channel_count();
//! let mut acquiring = scope.start_acquisition();
//!
//! let mut recorder = FrameRecorder::new();
//! acquiring.capture_frames(1, &mut recorder)?;
//!
//! if let Some(frame) = recorder.frames().next() {
//!     let capture = LogicCapture::from_frame(frame, channels)
//!         .expect("recorded frames are complete");
//!     let df = capture.to_dataframe()?;
//!     println!("{df}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Scanning without connecting
//!
//! ```rust,no_run
//! use fala_rs::FalaConnector;
//!
//! for device in FalaConnector::get_available_devices()? {
//!     println!(
//!         "Found {} at {} ({} channels)",
//!         device.name, device.port, device.header.channel_count
//!     );
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod capture_engine;
pub mod dataframe;
pub mod fala_connector;
pub mod fala_scope;
pub mod header;
pub mod serial_link;

// Re-export the main types for convenience
pub use capture_engine::{
    CaptureEngine, CaptureError, DatafeedSink, EngineStatus, FrameEvent, FrameRecorder,
};

pub use header::{parse_header, CaptureHeader, HeaderParseError};

pub use serial_link::{ByteLink, FalaLink, FalaLinkError};

pub use fala_connector::{FalaConnector, FalaConnectorError, FalaDevice};

pub use fala_scope::{AcquiringFalaScope, FalaScope, FalaScopeError};

pub use dataframe::LogicCapture;
