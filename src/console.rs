//! Line-based command surface for terminals
//!
//! Reads one command per line and prints the session status after each.
//! `connect` without arguments uses the configured server.
//! Input ends at EOF or `quit`; an interrupt on the line channel ends it early.

use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use tracing::info;

use crate::config::ServerConfig;
use crate::engine::TransportEngine;
use crate::session::{format_bitrate, Command, SessionController};

const HELP: &str = "\
Commands:
  connect [host] [port]   connect to a voice server
  disconnect              leave the server
  talk | begin            start transmitting (push-to-talk pressed)
  mute | end              stop transmitting (push-to-talk released)
  bitrate <bps>           change encoder bitrate
  status                  show session status
  help                    show this help
  quit                    disconnect and exit";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Session(Command),
    Help,
    Quit,
}

/// Event on the console's input channel
#[derive(Debug)]
pub enum InputEvent {
    Line(io::Result<String>),
    /// The reader reached end of input
    Closed,
    /// Ctrl-C: stop reading and disconnect
    Interrupt,
}

/// Forward stdin lines to `tx` from a background thread
pub fn spawn_stdin_reader(tx: mpsc::Sender<InputEvent>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.send(InputEvent::Line(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(InputEvent::Closed);
        })
}

/// Lines from the channel, ending at `Closed` or `Interrupt`
pub fn lines_until_interrupt(
    rx: mpsc::Receiver<InputEvent>,
) -> impl Iterator<Item = io::Result<String>> {
    rx.into_iter().map_while(|event| match event {
        InputEvent::Line(line) => Some(line),
        InputEvent::Closed => None,
        InputEvent::Interrupt => {
            info!("Console interrupted");
            None
        }
    })
}

/// Parse a console line; `Ok(None)` for blank lines
pub fn parse_line(line: &str, defaults: &ServerConfig) -> Result<Option<ConsoleInput>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let input = match (verb.as_str(), args.as_slice()) {
        ("help" | "?", _) => ConsoleInput::Help,
        ("quit" | "exit", _) => ConsoleInput::Quit,
        ("connect", []) => ConsoleInput::Session(Command::Connect {
            host: defaults.host.clone(),
            port: defaults.port,
        }),
        ("connect", [host]) => ConsoleInput::Session(Command::Connect {
            host: host.to_string(),
            port: defaults.port,
        }),
        _ => ConsoleInput::Session(line.parse()?),
    };

    Ok(Some(input))
}

/// Run the console until `quit` or end of input, then disconnect
pub fn run<E, I, W>(
    controller: &mut SessionController<E>,
    defaults: &ServerConfig,
    input: I,
    mut output: W,
) -> Result<()>
where
    E: TransportEngine,
    I: IntoIterator<Item = io::Result<String>>,
    W: Write,
{
    let mut status_rx = controller.subscribe();

    writeln!(
        output,
        "Voice chat console. Default server {}:{}, bitrates {}. Type 'help' for commands.",
        defaults.host,
        defaults.port,
        controller
            .policy()
            .supported
            .iter()
            .map(|bps| format_bitrate(*bps))
            .collect::<Vec<_>>()
            .join(", ")
    )?;

    for line in input {
        let line = line?;

        if let Err(e) = controller.check_connection() {
            writeln!(output, "! {}", e)?;
        }

        let command = match parse_line(&line, defaults) {
            Ok(Some(ConsoleInput::Session(command))) => command,
            Ok(Some(ConsoleInput::Help)) => {
                writeln!(output, "{}", HELP)?;
                continue;
            }
            Ok(Some(ConsoleInput::Quit)) => break,
            Ok(None) => continue,
            Err(e) => {
                writeln!(output, "? {}", e)?;
                continue;
            }
        };

        if let Err(e) = controller.execute(command) {
            writeln!(output, "! {}", e)?;
        }

        let status = status_rx.borrow_and_update().clone();
        writeln!(
            output,
            "{} | bitrate {}",
            status.summary(),
            format_bitrate(status.bitrate)
        )?;
    }

    info!("Console closed");
    controller.disconnect();

    Ok(())
}
