//! DataFrame output for completed captures.
//!
//! Mirrors the raw packet stream into `polars` for analysis: one row per
//! sample, a `time` column derived from the sample rate, and one boolean
//! `bit_k` column per logic channel.

use crate::capture_engine::FrameEvent;
use polars::prelude::*;

/// One completed capture, reassembled from a recorded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicCapture {
    /// Sample rate in Hz, from the frame's metadata notification.
    pub sample_rate: u32,
    /// Logic channels present in each sample byte.
    pub channel_count: u32,
    /// Sample rows, oldest first.
    pub samples: Vec<u8>,
    /// Sample index of the trigger point, when the capture was triggered.
    pub trigger_index: Option<usize>,
}

impl LogicCapture {
    /// Reassemble a capture from one recorded frame (a `FrameBegin` through
    /// `FrameEnd` slice, as produced by
    /// [`FrameRecorder::frames`](crate::capture_engine::FrameRecorder::frames)).
    ///
    /// Returns `None` for a frame with no end marker. `channel_count` comes
    /// from the device handle; the packet stream does not carry it.
    pub fn from_frame(frame: &[FrameEvent], channel_count: u32) -> Option<Self> {
        let mut sample_rate = 0;
        let mut samples = Vec::new();
        let mut trigger_index = None;
        let mut complete = false;

        for event in frame {
            match event {
                FrameEvent::FrameBegin => {}
                FrameEvent::Samplerate(rate) => sample_rate = *rate,
                FrameEvent::Logic {
                    samples: packet, ..
                } => samples.extend_from_slice(packet),
                FrameEvent::Trigger => trigger_index = Some(samples.len()),
                FrameEvent::FrameEnd => {
                    complete = true;
                    break;
                }
            }
        }

        complete.then_some(Self {
            sample_rate,
            channel_count,
            samples,
            trigger_index,
        })
    }

    /// Duration of one sample period in seconds.
    fn sample_period(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        1.0 / f64::from(self.sample_rate)
    }

    /// Convert to a DataFrame with `time` plus one `bit_k` column per channel.
    pub fn to_dataframe(&self) -> Result<DataFrame, PolarsError> {
        let period = self.sample_period();
        let time: Vec<f64> = (0..self.samples.len())
            .map(|i| i as f64 * period)
            .collect();

        let mut columns: Vec<Column> = Vec::with_capacity(1 + self.channel_count as usize);
        columns.push(Series::new("time".into(), time).into());

        for bit in 0..self.channel_count.min(8) {
            let values: Vec<bool> = self
                .samples
                .iter()
                .map(|sample| (sample >> bit) & 1 == 1)
                .collect();
            columns.push(Series::new(format!("bit_{bit}").into(), values).into());
        }

        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggered_frame() -> Vec<FrameEvent> {
        vec![
            FrameEvent::FrameBegin,
            FrameEvent::Samplerate(1_000_000),
            FrameEvent::Logic {
                samples: vec![0b01],
                unit_size: 1,
            },
            FrameEvent::Trigger,
            FrameEvent::Logic {
                samples: vec![0b10, 0b11, 0b00],
                unit_size: 1,
            },
            FrameEvent::FrameEnd,
        ]
    }

    #[test]
    fn reassembles_a_triggered_frame() {
        let capture = LogicCapture::from_frame(&triggered_frame(), 2).unwrap();
        assert_eq!(capture.sample_rate, 1_000_000);
        assert_eq!(capture.samples, [0b01, 0b10, 0b11, 0b00]);
        assert_eq!(capture.trigger_index, Some(1));
    }

    #[test]
    fn incomplete_frame_yields_nothing() {
        let mut frame = triggered_frame();
        frame.pop();
        assert!(LogicCapture::from_frame(&frame, 2).is_none());
    }

    #[test]
    fn dataframe_has_time_and_bit_columns() {
        let capture = LogicCapture::from_frame(&triggered_frame(), 2).unwrap();
        let df = capture.to_dataframe().unwrap();

        assert_eq!(df.height(), 4);
        let names: Vec<_> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, ["time", "bit_0", "bit_1"]);

        // 1 MHz: one microsecond per row.
        let time = df.column("time").unwrap().f64().unwrap();
        assert!((time.get(1).unwrap() - 1e-6).abs() < 1e-12);

        let bit0 = df.column("bit_0").unwrap().bool().unwrap();
        assert_eq!(
            bit0.into_iter().collect::<Vec<_>>(),
            [Some(true), Some(false), Some(true), Some(false)]
        );
    }

    #[test]
    fn untriggered_capture_has_no_trigger_index() {
        let frame = vec![
            FrameEvent::FrameBegin,
            FrameEvent::Samplerate(8_000_000),
            FrameEvent::Logic {
                samples: vec![1, 2, 3],
                unit_size: 1,
            },
            FrameEvent::FrameEnd,
        ];
        let capture = LogicCapture::from_frame(&frame, 8).unwrap();
        assert_eq!(capture.trigger_index, None);
        assert_eq!(capture.samples.len(), 3);
    }
}
