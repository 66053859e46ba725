// Continuous acquisition: capture a number of frames and print each one.
//
// The Bus Pirate drives the capture timing (follow-along mode); this side
// just polls the port and lets the engine re-arm after every frame.

use clap::Parser;
use fala_rs::{FalaConnector, FrameRecorder, LogicCapture};

#[derive(Parser)]
#[command(about = "Capture logic frames from a FALA device")]
struct Args {
    /// Serial port of the device; scans all ports when omitted
    #[arg(short, long)]
    port: Option<String>,

    /// Number of capture frames to wait for
    #[arg(short, long, default_value_t = 1)]
    frames: u64,

    /// Comma-separated channel names, e.g. "sda,scl,,cs"
    #[arg(short, long)]
    channels: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut scope = FalaConnector::connect(args.port.as_deref())?;
    if let Some(spec) = &args.channels {
        scope.rename_channels(spec);
    }

    println!(
        "Connected to {} ({} channels, {} Hz, up to {} samples per capture)",
        scope.port(),
        scope.channel_count(),
        scope.sample_rate(),
        scope.sample_limit()
    );
    println!("Channels: {}\n", scope.channel_names().join(", "));

    let channel_count = scope.channel_count();
    let mut acquiring = scope.start_acquisition();
    let mut recorder = FrameRecorder::new();

    println!("Waiting for {} capture(s)...", args.frames);
    acquiring.capture_frames(args.frames, &mut recorder)?;

    for (i, frame) in recorder.frames().enumerate() {
        let Some(capture) = LogicCapture::from_frame(frame, channel_count) else {
            continue;
        };
        println!(
            "Frame {}: {} samples at {} Hz, trigger at {:?}",
            i + 1,
            capture.samples.len(),
            capture.sample_rate,
            capture.trigger_index
        );
        println!("{}", capture.to_dataframe()?);
    }

    let _scope = acquiring.stop();
    Ok(())
}
