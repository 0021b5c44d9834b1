//! Command-line parsing for the `hemiscope` binary.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

use crate::tracking::Direction;

pub const USAGE: &str = "\
hemiscope (talks to the BCI backend at http://localhost:5000 by default)
Usage: hemiscope [options] [command]

Commands:
  run                   Connect, poll and render until Ctrl-C (default)
  status                Check the backend once and print the session line
  connect [--webcam]    Open a backend connection and exit
  disconnect            Close the backend connection
  reset                 Reset the backend connection state
  errors                Print the recorded error log, newest first

Options:
  --data-dir <path>     Settings and error log location
  --backend <url>       Backend base URL
  --frames <dir>        Play back image frames as the camera feed
  --synthetic <gaze>    Use a synthetic camera looking left, center or right
  --webcam              Ask the backend for webcam mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    Run,
    Status,
    Connect,
    Disconnect,
    Reset,
    Errors,
}

impl Command {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "run" => Some(Command::Run),
            "status" => Some(Command::Status),
            "connect" => Some(Command::Connect),
            "disconnect" => Some(Command::Disconnect),
            "reset" => Some(Command::Reset),
            "errors" => Some(Command::Errors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub command: Command,
    pub data_dir: Option<PathBuf>,
    pub backend: Option<String>,
    pub frames: Option<PathBuf>,
    pub synthetic: Option<Direction>,
    pub webcam: bool,
    pub help: bool,
}

pub fn parse_args<I>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut command = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow!("{flag} expects a value"))
        };
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--webcam" => parsed.webcam = true,
            "--data-dir" => parsed.data_dir = Some(PathBuf::from(value_for("--data-dir")?)),
            "--backend" => parsed.backend = Some(value_for("--backend")?),
            "--frames" => parsed.frames = Some(PathBuf::from(value_for("--frames")?)),
            "--synthetic" => {
                let value = value_for("--synthetic")?;
                let direction = Direction::parse(&value).ok_or_else(|| {
                    anyhow!("--synthetic expects left, center or right, got {value}")
                })?;
                parsed.synthetic = Some(direction);
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            other => {
                if command.is_some() {
                    bail!("unexpected argument {other}");
                }
                command =
                    Some(Command::parse(other).ok_or_else(|| anyhow!("unknown command {other}"))?);
            }
        }
    }

    if parsed.frames.is_some() && parsed.synthetic.is_some() {
        bail!("--frames and --synthetic are mutually exclusive");
    }

    parsed.command = command.unwrap_or_default();
    Ok(parsed)
}
