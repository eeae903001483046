//! One line of the temperature log.

use core::fmt;

/// Value a DS18B20 read reports when the device does not answer.
pub const DISCONNECTED_C: f32 = -127.0;

/// A timestamp followed by one reading per enumerated device, in
/// enumeration order. Rendered as a single comma-separated line; the last
/// reading carries no trailing comma.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: String,
    pub readings: Vec<f32>,
}

impl LogRecord {
    pub fn new(timestamp: String, readings: Vec<f32>) -> Self {
        Self {
            timestamp,
            readings,
        }
    }

    /// Number of comma-separated reading fields after the timestamp.
    pub fn field_count(&self) -> usize {
        self.readings.len()
    }

    /// The record plus its line terminator, ready for a single append.
    pub fn to_line(&self) -> String {
        let mut line = self.to_string();
        line.push('\n');
        line
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, ", self.timestamp)?;
        for (i, celsius) in self.readings.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{:.2}", celsius)?;
        }
        Ok(())
    }
}
