//! Operator command interface.

pub mod protocol;
pub mod server;

pub use protocol::{Command, CommandParseError, HELP_LINES, apply_backspace, banner, parse_command};
pub use server::{CommandRequest, CommandServer, ControlCommand, ControlReply};
