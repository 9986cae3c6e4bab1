use serde::{Deserialize, Serialize};

/// Supported encoder bitrates and the one applied on every new connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitratePolicy {
    /// Bitrates a caller may select, in bits per second
    pub supported: Vec<u32>,

    /// Bitrate applied right after connecting
    pub default: u32,
}

impl Default for BitratePolicy {
    fn default() -> Self {
        Self {
            supported: vec![32000, 64000],
            default: 64000,
        }
    }
}

impl BitratePolicy {
    pub fn is_supported(&self, bits_per_second: u32) -> bool {
        self.supported.contains(&bits_per_second)
    }
}

/// Format a bitrate for display ("64 kbit/s")
pub fn format_bitrate(bits_per_second: u32) -> String {
    if bits_per_second % 1000 == 0 {
        format!("{} kbit/s", bits_per_second / 1000)
    } else {
        format!("{} bit/s", bits_per_second)
    }
}
