//! SRT subtitle reader and DJI telemetry caption parser

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading telemetry captions
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("line {line}: malformed SRT timestamp '{text}'")]
    MalformedTimestamp { line: usize, text: String },

    #[error("line {line}: caption has no usable {field} field: '{caption}'")]
    MalformedCaption {
        line: usize,
        field: &'static str,
        caption: String,
    },

    #[error("line {line}: expected a blank line after the caption, found '{text}'")]
    MalformedRecord { line: usize, text: String },

    #[error("failed to read telemetry '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtRecord {
    /// Start of the subtitle in milliseconds
    pub timestamp_ms: u32,
    pub caption: String,
    /// Line number of the caption within the file (1-based)
    pub line: usize,
}

/// Reads single-line SRT records.
///
/// Each record is an index line, a `HH:MM:SS,mmm --> ...` line, one caption
/// line and a blank separator. A non-blank line in place of the separator is
/// an error. The stream ends at the first record cut short by end of file.
pub struct SrtReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    source: String,
}

impl SrtReader<BufReader<File>> {
    /// Open an SRT file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TelemetryError> {
        let source = path.as_ref().to_string_lossy().to_string();
        let file = File::open(&path).map_err(|e| TelemetryError::Io {
            path: source.clone(),
            source: e,
        })?;
        Ok(Self::with_source(BufReader::new(file), source))
    }
}

impl<R: BufRead> SrtReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_source(reader, "<memory>".to_string())
    }

    fn with_source(reader: R, source: String) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            source,
        }
    }

    /// Next line without its terminator; `None` at end of file
    fn next_line(&mut self) -> Option<Result<String, TelemetryError>> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(
            line.map(|l| l.trim_end_matches('\r').to_string())
                .map_err(|e| TelemetryError::Io {
                    path: self.source.clone(),
                    source: e,
                }),
        )
    }

    fn read_record(&mut self) -> Option<Result<SrtRecord, TelemetryError>> {
        // subtitle index, skipping stray blank lines between records
        loop {
            match self.next_line()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(_) => break,
                Err(e) => return Some(Err(e)),
            }
        }

        let stamp = match self.next_line()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        let stamp_line = self.line_no;

        let caption = match self.next_line()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        let caption_line = self.line_no;

        // separator; a missing one at end of file still completes the record
        match self.next_line() {
            Some(Ok(line)) if !line.trim().is_empty() => {
                return Some(Err(TelemetryError::MalformedRecord {
                    line: self.line_no,
                    text: line,
                }))
            }
            Some(Err(e)) => return Some(Err(e)),
            _ => {}
        }

        let timestamp_ms = match parse_srt_timestamp(&stamp) {
            Some(ms) => ms,
            None => {
                return Some(Err(TelemetryError::MalformedTimestamp {
                    line: stamp_line,
                    text: stamp,
                }))
            }
        };

        Some(Ok(SrtRecord {
            timestamp_ms,
            caption,
            line: caption_line,
        }))
    }
}

impl<R: BufRead> Iterator for SrtReader<R> {
    type Item = Result<SrtRecord, TelemetryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record()
    }
}

/// Parse the leading `HH:MM:SS,mmm` of an SRT timing line into milliseconds
pub fn parse_srt_timestamp(text: &str) -> Option<u32> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    if bytes.len() < 12 || bytes[2] != b':' || bytes[5] != b':' || bytes[8] != b',' {
        return None;
    }

    let field = |range: std::ops::Range<usize>| -> Option<u32> {
        let digits = text.get(range)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    };

    let hours = field(0..2)?;
    let minutes = field(3..5)?;
    let seconds = field(6..8)?;
    let millis = field(9..12)?;

    Some(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

/// Telemetry extracted from one DJI caption
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp_ms: u32,
    pub longitude: f64,
    pub latitude: f64,
    /// Home altitude plus height above home (meters)
    pub altitude: f64,
    /// Height above the take-off point (meters)
    pub relative_height: f64,
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

/// Parser for DJI flight-data captions such as
/// `... RTK (13.21285566, 55.71090721, 45.3), HOME (13.21, 55.71, 76.7m), ... H 25.60m, ... G.PRY (-90.0°, 0.0°, 12.5°)`
#[derive(Debug, Clone, Default)]
pub struct DjiCaptionParser;

impl DjiCaptionParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one caption; `line` is only used for error reporting
    pub fn parse(&self, timestamp_ms: u32, caption: &str, line: usize) -> Result<TelemetryRecord, TelemetryError> {
        let malformed = |field: &'static str| TelemetryError::MalformedCaption {
            line,
            field,
            caption: caption.to_string(),
        };

        let rtk = bracketed_values(caption, "RTK (").ok_or_else(|| malformed("RTK"))?;
        let longitude = rtk.first().and_then(|v| parse_number(v, "")).ok_or_else(|| malformed("RTK"))?;
        let latitude = rtk.get(1).and_then(|v| parse_number(v, "")).ok_or_else(|| malformed("RTK"))?;

        let home = bracketed_values(caption, "HOME (").ok_or_else(|| malformed("HOME"))?;
        let home_altitude = home.get(2).and_then(|v| parse_number(v, "m")).ok_or_else(|| malformed("HOME"))?;

        let relative_height = relative_height(caption).ok_or_else(|| malformed("H"))?;

        let pry = bracketed_values(caption, "G.PRY (").ok_or_else(|| malformed("G.PRY"))?;
        let angles: Vec<f64> = pry.iter().filter_map(|v| parse_number(v, "°")).collect();
        if angles.len() != 3 {
            return Err(malformed("G.PRY"));
        }

        Ok(TelemetryRecord {
            timestamp_ms,
            longitude,
            latitude,
            altitude: home_altitude + relative_height,
            relative_height,
            pitch: angles[0] as f32,
            roll: angles[1] as f32,
            yaw: angles[2] as f32,
        })
    }
}

/// Comma separated values between `prefix` and the next `)`
fn bracketed_values<'a>(caption: &'a str, prefix: &str) -> Option<Vec<&'a str>> {
    let start = caption.find(prefix)? + prefix.len();
    let len = caption[start..].find(')')?;
    Some(caption[start..start + len].split(',').map(str::trim).collect())
}

fn parse_number(text: &str, unit: &str) -> Option<f64> {
    let value: f64 = text.trim().strip_suffix(unit)?.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Value of the last `H <height>m` token
fn relative_height(caption: &str) -> Option<f64> {
    caption
        .match_indices("H ")
        .filter(|(idx, _)| {
            *idx == 0 || matches!(caption.as_bytes()[idx - 1], b' ' | b',' | b'[')
        })
        .filter_map(|(idx, _)| {
            let rest = &caption[idx + 2..];
            let end = rest.find('m')?;
            parse_number(&rest[..=end], "m")
        })
        .last()
}

/// Iterator of telemetry records read from an SRT file
pub struct TelemetryReader<R: BufRead> {
    srt: SrtReader<R>,
    parser: DjiCaptionParser,
}

impl TelemetryReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TelemetryError> {
        Ok(Self::from_srt(SrtReader::open(path)?))
    }
}

impl<R: BufRead> TelemetryReader<R> {
    pub fn from_srt(srt: SrtReader<R>) -> Self {
        Self {
            srt,
            parser: DjiCaptionParser::new(),
        }
    }
}

impl<R: BufRead> Iterator for TelemetryReader<R> {
    type Item = Result<TelemetryRecord, TelemetryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.srt.next()?;
        Some(record.and_then(|r| self.parser.parse(r.timestamp_ms, &r.caption, r.line)))
    }
}

/// Read every telemetry record of a caption file.
///
/// The first malformed record aborts the read.
pub fn parse_telemetry<P: AsRef<Path>>(path: P) -> Result<Vec<TelemetryRecord>, TelemetryError> {
    TelemetryReader::open(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CAPTION: &str = "F/2.8, SS 640, ISO 100, EV 0, RTK (13.21285566, 55.71090721, 45.30), \
        HOME (13.21270959, 55.71090706, 76.70m), D 12.50m, H 25.60m, H.S 0.00m/s, V.S 0.00m/s, \
        F.PRY (-1.2°, 0.3°, 12.1°), G.PRY (-90.0°, 0.0°, 12.5°)";

    fn srt(entries: &[(u32, &str, &str)]) -> String {
        entries
            .iter()
            .map(|(idx, stamp, caption)| format!("{}\n{} --> 00:00:01,000\n{}\n\n", idx, stamp, caption))
            .collect()
    }

    #[test]
    fn test_parse_srt_timestamp() {
        assert_eq!(parse_srt_timestamp("00:00:00,000 --> 00:00:01,000"), Some(0));
        assert_eq!(parse_srt_timestamp("01:02:03,456"), Some(3_723_456));
        assert_eq!(parse_srt_timestamp("1:02:03,456"), None);
        assert_eq!(parse_srt_timestamp("aa:02:03,456"), None);
    }

    #[test]
    fn test_srt_reader_yields_records() {
        let text = srt(&[(1, "00:00:00,000", "first"), (2, "00:00:01,500", "second")]);
        let records: Vec<SrtRecord> = SrtReader::new(Cursor::new(text)).collect::<Result<_, _>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp_ms, 1500);
        assert_eq!(records[1].caption, "second");
        assert_eq!(records[1].line, 7);
    }

    #[test]
    fn test_truncated_record_ends_stream() {
        let mut text = srt(&[(1, "00:00:00,000", "first")]);
        text.push_str("2\n00:00:01,000 --> 00:00:02,000\n");

        let records: Vec<SrtRecord> = SrtReader::new(Cursor::new(text)).collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_final_separator_keeps_record() {
        let text = "1\r\n00:00:02,000 --> 00:00:03,000\r\nlast";
        let records: Vec<SrtRecord> = SrtReader::new(Cursor::new(text)).collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp_ms, 2000);
        assert_eq!(records[0].caption, "last");
    }

    #[test]
    fn test_multi_line_caption_is_malformed() {
        let text = "1\n00:00:00,000 --> 00:00:01,000\nfirst line\nsecond line\n\n\
                    2\n00:00:01,000 --> 00:00:02,000\nnext\n\n";
        let err = SrtReader::new(Cursor::new(text)).next().unwrap().unwrap_err();
        match err {
            TelemetryError::MalformedRecord { line, text } => {
                assert_eq!(line, 4);
                assert_eq!(text, "second line");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let text = srt(&[(1, "00:00", "first")]);
        let err = SrtReader::new(Cursor::new(text)).next().unwrap().unwrap_err();
        assert!(matches!(err, TelemetryError::MalformedTimestamp { line: 2, .. }));
    }

    #[test]
    fn test_dji_caption_fields() {
        let record = DjiCaptionParser::new().parse(1000, CAPTION, 3).unwrap();

        assert_eq!(record.timestamp_ms, 1000);
        assert_eq!(record.longitude, 13.21285566);
        assert_eq!(record.latitude, 55.71090721);
        assert!((record.relative_height - 25.6).abs() < 1e-9);
        assert!((record.altitude - 102.3).abs() < 1e-9);
        assert_eq!(record.pitch, -90.0);
        assert_eq!(record.yaw, 12.5);
    }

    #[test]
    fn test_caption_without_rtk_is_malformed() {
        let caption = CAPTION.replace("RTK", "GPS");
        let err = DjiCaptionParser::new().parse(0, &caption, 11).unwrap_err();
        match err {
            TelemetryError::MalformedCaption { line, field, .. } => {
                assert_eq!(line, 11);
                assert_eq!(field, "RTK");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_telemetry_reader_propagates_malformed_caption() {
        let text = srt(&[(1, "00:00:00,000", CAPTION), (2, "00:00:01,000", "garbage")]);
        let results: Vec<_> = TelemetryReader::from_srt(SrtReader::new(Cursor::new(text))).collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(TelemetryError::MalformedCaption { .. })));
    }
}
