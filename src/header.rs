//! Parser for the `$FALADATA` capability/header record.
//!
//! The device answers the `"?"` identification byte, and prefixes every
//! capture, with a single ASCII line of the form
//! `$FALADATA;8;0;0;N;8000000;1000;200;` declaring the capture parameters.

/// Marker every header record starts with.
pub const HEADER_MARKER: &[u8] = b"$FALADATA";

/// Shortest well-formed header record, in bytes.
///
/// Reads that return fewer bytes than this cannot contain a full record and
/// are rejected before parsing.
pub const MIN_HEADER_LEN: usize = 18;

/// Capture parameters declared by one `$FALADATA` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    /// Number of logic channels in this capture.
    pub channel_count: u32,
    /// Bitmask of channels participating in the trigger condition.
    pub trigger_channel_mask: u32,
    /// Bitmask of required logic levels for the triggered channels.
    pub trigger_value_mask: u32,
    /// Whether the trigger is edge-sensitive.
    pub edge_trigger: bool,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Total samples in the capture.
    pub sample_count: u32,
    /// Samples recorded before the trigger point.
    pub pre_trigger_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum HeaderParseError {
    #[error("input does not start with the $FALADATA marker")]
    NotAHeader,

    #[error("header record ends before the '{field}' field")]
    Truncated { field: &'static str },
}

/// Advance past the next `';'`, returning the remainder after the delimiter.
fn next_field<'a>(buf: &'a [u8], field: &'static str) -> Result<&'a [u8], HeaderParseError> {
    buf.iter()
        .position(|&b| b == b';')
        .map(|i| &buf[i + 1..])
        .ok_or(HeaderParseError::Truncated { field })
}

/// Decimal-integer-from-prefix, `atoi` style.
///
/// Skips leading ASCII whitespace, then consumes decimal digits. A
/// non-numeric prefix yields 0 rather than an error; the device firmware
/// relies on this leniency.
fn parse_uint_prefix(buf: &[u8]) -> u32 {
    let mut value: u32 = 0;
    for b in buf.iter().skip_while(|b| b.is_ascii_whitespace()) {
        if !b.is_ascii_digit() {
            break;
        }
        value = value
            .saturating_mul(10)
            .saturating_add(u32::from(b - b'0'));
    }
    value
}

/// Parse one `$FALADATA` header record.
///
/// All seven semicolon-delimited fields must be present; partial records are
/// rejected wholesale. No field-range validation is performed here (a
/// `channel_count` of 0 parses fine) — that is the caller's business.
///
/// Pure function over the input; safe to call repeatedly.
pub fn parse_header(buf: &[u8]) -> Result<CaptureHeader, HeaderParseError> {
    let rest = buf
        .strip_prefix(HEADER_MARKER)
        .ok_or(HeaderParseError::NotAHeader)?;

    let rest = next_field(rest, "channel_count")?;
    let channel_count = parse_uint_prefix(rest);
    let rest = next_field(rest, "trigger_channel_mask")?;
    let trigger_channel_mask = parse_uint_prefix(rest);
    let rest = next_field(rest, "trigger_value_mask")?;
    let trigger_value_mask = parse_uint_prefix(rest);
    let rest = next_field(rest, "edge_trigger")?;
    let edge = rest.first() == Some(&b'Y');
    let rest = next_field(rest, "sample_rate")?;
    let sample_rate = parse_uint_prefix(rest);
    let rest = next_field(rest, "sample_count")?;
    let sample_count = parse_uint_prefix(rest);
    let rest = next_field(rest, "pre_trigger_count")?;
    let pre_trigger_count = parse_uint_prefix(rest);

    Ok(CaptureHeader {
        channel_count,
        trigger_channel_mask,
        trigger_value_mask,
        edge_trigger: edge,
        sample_rate,
        sample_count,
        pre_trigger_count,
    })
}
