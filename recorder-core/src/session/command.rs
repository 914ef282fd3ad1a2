use std::fmt;
use std::str::FromStr;

use crate::models::error::RecorderError;
use crate::models::records::FileEntry;

/// Command listing shown for unrecognized input.
pub const USAGE: &str = "\
Available commands:
  start-record | record    Start recording
  stop-record  | stop      Stop recording
  list         | ls        List recordings
  play <name>              Play a recording
  delete <name> | rm <name>  Delete a recording";

/// A user command for the control state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartRecord,
    StopRecord,
    List,
    Play(String),
    Delete(String),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartRecord => "start-record",
            Self::StopRecord => "stop-record",
            Self::List => "list",
            Self::Play(_) => "play",
            Self::Delete(_) => "delete",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play(name) | Self::Delete(name) => write!(f, "{} {}", self.name(), name),
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for Command {
    type Err = RecorderError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(RecorderError::Usage(USAGE.into()));
        };
        let argument = words.next();

        let with_name = |build: fn(String) -> Command, usage: &str| match argument {
            Some(name) => Ok(build(name.to_string())),
            None => Err(RecorderError::Usage(format!("Usage: {}", usage))),
        };

        match word {
            "start-record" | "record" => Ok(Self::StartRecord),
            "stop-record" | "stop" => Ok(Self::StopRecord),
            "list" | "ls" => Ok(Self::List),
            "play" => with_name(Self::Play, "play <name>"),
            "delete" | "rm" => with_name(Self::Delete, "delete <name>"),
            other => Err(RecorderError::Usage(format!("Unknown command: {}\n{}", other, USAGE))),
        }
    }
}

/// What a successfully handled command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    RecordingStarted,
    /// Capture stopped. `sample_count` is `None` when the capture did not
    /// confirm within the stop wait; storage finishes in the background.
    RecordingStopped { sample_count: Option<usize> },
    Listed(Vec<FileEntry>),
    PlaybackStarted(String),
    Deleted(String),
}
