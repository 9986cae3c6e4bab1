use std::str::FromStr;

/// A command a surface can issue to the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { host: String, port: u16 },
    Disconnect,
    BeginTransmit,
    EndTransmit,
    SetBitrate(u32),
    Status,
}

impl FromStr for Command {
    type Err = String;

    /// Parse the textual form, e.g. `connect 127.0.0.1 9000`, `talk`, `bitrate 32000`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".to_string());
        };
        let args: Vec<&str> = parts.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("connect", [host, port]) => Command::Connect {
                host: host.to_string(),
                port: port
                    .parse()
                    .map_err(|_| format!("invalid port: {}", port))?,
            },
            ("connect", _) => return Err("usage: connect <host> <port>".to_string()),
            ("disconnect", []) => Command::Disconnect,
            ("talk" | "begin", []) => Command::BeginTransmit,
            ("mute" | "end", []) => Command::EndTransmit,
            ("bitrate", [bps]) => Command::SetBitrate(
                bps.parse()
                    .map_err(|_| format!("invalid bitrate: {}", bps))?,
            ),
            ("bitrate", _) => return Err("usage: bitrate <bits-per-second>".to_string()),
            ("status", []) => Command::Status,
            (verb, []) => return Err(format!("unknown command: {}", verb)),
            (verb, _) => return Err(format!("unexpected arguments for {}", verb)),
        };

        Ok(command)
    }
}
