use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use chrono::{DateTime, Utc};
use crate::analysis::AnalysisError;
/// Raw instrument time units per second.
pub const TIME_CONVERSION: f64 = 2.324243143792273;
const COLUMNS: usize = 6;
/// One parsed sweep file, column by column, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepRecord {
    pub time: Vec<i64>,
    pub frequency: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub amplitude: Vec<f64>,
    pub id: Vec<i64>,
}
impl SweepRecord {
    /// Parses `time frequency X Y amplitude id` rows, skipping `#` comment lines
    /// wherever they appear. Comment lines are never decoded, so any bytes may follow
    /// the `#`.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, AnalysisError> {
        let mut record = SweepRecord::default();
        for (idx, bytes) in reader.split(b'\n').enumerate() {
            let bytes = bytes?;
            let line_no = idx + 1;
            if bytes.first() == Some(&b'#') {
                continue;
            }
            let line = std::str::from_utf8(&bytes).map_err(|err| AnalysisError::Parse {
                line: line_no,
                reason: format!("not valid UTF-8: {err}"),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = [0.0f64; COLUMNS];
            let mut count = 0;
            for token in line.split_whitespace() {
                if count == COLUMNS {
                    return Err(AnalysisError::Parse {
                        line: line_no,
                        reason: format!("expected {COLUMNS} fields, found more"),
                    });
                }
                let value = token.parse::<f64>().map_err(|_| AnalysisError::Parse {
                    line: line_no,
                    reason: format!("`{token}` is not a number"),
                })?;
                if !value.is_finite() {
                    return Err(AnalysisError::Parse {
                        line: line_no,
                        reason: format!("`{token}` is not a finite number"),
                    });
                }
                fields[count] = value;
                count += 1;
            }
            if count != COLUMNS {
                return Err(AnalysisError::Parse {
                    line: line_no,
                    reason: format!("expected {COLUMNS} fields, found {count}"),
                });
            }
            record.push_row(fields);
        }
        if record.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        log::debug!("parsed sweep with {} samples", record.len());
        Ok(record)
    }
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let record = Self::parse(BufReader::new(file))?;
        log::info!("File: {} was parsed", path.display());
        Ok(record)
    }
    fn push_row(&mut self, fields: [f64; COLUMNS]) {
        // `as` truncates toward zero, like the instrument's integer columns.
        self.time.push(fields[0] as i64);
        self.frequency.push(fields[1]);
        self.x.push(fields[2]);
        self.y.push(fields[3]);
        self.amplitude.push(fields[4]);
        self.id.push(fields[5] as i64);
    }
    pub fn len(&self) -> usize {
        self.frequency.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }
    /// UTC time of the first sample, for plot titles.
    pub fn acquisition_time(&self) -> Option<DateTime<Utc>> {
        self.acquisition_time_with(TIME_CONVERSION)
    }
    pub fn acquisition_time_with(&self, units_per_second: f64) -> Option<DateTime<Utc>> {
        let raw = *self.time.first()?;
        raw_time_to_utc_with(raw, units_per_second)
    }
}
/// Converts a raw instrument timestamp into UTC.
pub fn raw_time_to_utc_with(raw: i64, units_per_second: f64) -> Option<DateTime<Utc>> {
    let seconds = raw as f64 / units_per_second;
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999))
}
