use serde::{Deserialize, Serialize};

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

impl Volume {
    /// e.g. "756.4 GB / 931.5 GB (81%)"
    pub fn usage_display(&self) -> String {
        format!(
            "{} / {} ({:.0}%)",
            format_bytes(self.used),
            format_bytes(self.total),
            self.percent
        )
    }
}

/// Human-readable size with binary multiples
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
