//! Host-to-camera commands.
//!
//! Commands are newline-terminated ASCII lines:
//!
//! | Line        | Meaning                                      |
//! |-------------|----------------------------------------------|
//! | `S`         | capture and start sending an image           |
//! | `E`         | image fully received, device may release it  |
//! | `R<index>`  | resend packet `index` (decimal, no padding)  |

use std::fmt;

/// A command sent from the host to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCommand {
    /// Start an image transfer.
    RequestImage,
    /// Acknowledge a complete image.
    Complete,
    /// Ask for one packet again.
    Resend(u32),
}

impl HostCommand {
    /// Wire bytes for this command, newline included.
    pub fn encode(&self) -> Vec<u8> {
        format!("{self}\n").into_bytes()
    }

    /// Parse one command line (trailing `\r`/`\n` ignored).
    ///
    /// The host never receives commands; this is for device simulators.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line {
            "S" => Some(Self::RequestImage),
            "E" => Some(Self::Complete),
            _ => line
                .strip_prefix('R')
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse().ok())
                .map(Self::Resend),
        }
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestImage => f.write_str("S"),
            Self::Complete => f.write_str("E"),
            Self::Resend(index) => write!(f, "R{index}"),
        }
    }
}
