//! Console command parsing.
//!
//! One line of input becomes one [`Command`]. Tokens are separated by any
//! amount of whitespace.

use std::path::PathBuf;

use thiserror::Error;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `login host:port user pass`
    Login {
        addr: String,
        host: String,
        user: String,
        passcode: String,
    },
    /// `join channel`
    Join { channel: String },
    /// `exit channel`
    Exit { channel: String },
    /// `report filename`
    Report { file: PathBuf },
    /// `summary channel user filename`
    Summary {
        channel: String,
        user: String,
        file: PathBuf,
    },
    /// `logout`
    Logout,
}

/// Why a line did not produce a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Blank line.
    #[error("empty command")]
    Empty,
    /// First token is not a known command.
    #[error("unknown command {0:?}")]
    Unknown(String),
    /// Known command with the wrong arguments; carries the usage line.
    #[error("usage: {0}")]
    Usage(&'static str),
}

mod usage {
    pub const LOGIN: &str = "login {host:port} {username} {password}";
    pub const JOIN: &str = "join {channel_name}";
    pub const EXIT: &str = "exit {channel_name}";
    pub const REPORT: &str = "report {file}";
    pub const SUMMARY: &str = "summary {channel_name} {user} {file}";
    pub const LOGOUT: &str = "logout";
}

impl Command {
    /// Parse one console line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = tokens.split_first() else {
            return Err(CommandError::Empty);
        };

        match (name, args) {
            ("login", [addr, user, passcode]) => {
                let (host, port) = addr
                    .split_once(':')
                    .ok_or(CommandError::Usage(usage::LOGIN))?;
                if host.is_empty() || port.parse::<u16>().is_err() {
                    return Err(CommandError::Usage(usage::LOGIN));
                }
                Ok(Command::Login {
                    addr: addr.to_string(),
                    host: host.to_string(),
                    user: user.to_string(),
                    passcode: passcode.to_string(),
                })
            }
            ("login", _) => Err(CommandError::Usage(usage::LOGIN)),

            ("join", [channel]) => Ok(Command::Join {
                channel: channel.to_string(),
            }),
            ("join", _) => Err(CommandError::Usage(usage::JOIN)),

            ("exit", [channel]) => Ok(Command::Exit {
                channel: channel.to_string(),
            }),
            ("exit", _) => Err(CommandError::Usage(usage::EXIT)),

            ("report", [file]) => Ok(Command::Report {
                file: PathBuf::from(*file),
            }),
            ("report", _) => Err(CommandError::Usage(usage::REPORT)),

            ("summary", [channel, user, file]) => Ok(Command::Summary {
                channel: channel.to_string(),
                user: user.to_string(),
                file: PathBuf::from(*file),
            }),
            ("summary", _) => Err(CommandError::Usage(usage::SUMMARY)),

            ("logout", []) => Ok(Command::Logout),
            ("logout", _) => Err(CommandError::Usage(usage::LOGOUT)),

            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Command name as typed.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "login",
            Command::Join { .. } => "join",
            Command::Exit { .. } => "exit",
            Command::Report { .. } => "report",
            Command::Summary { .. } => "summary",
            Command::Logout => "logout",
        }
    }
}
