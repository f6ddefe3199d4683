//! External process execution
//!
//! Everything that leaves the process (hook commands, command-backed workers)
//! goes through the `CommandExecutor` abstraction defined here.

pub mod command;

pub use command::{
    CommandError, CommandExecutor, CommandOutput, CommandRequest, CommandSpec,
    ProcessCommandExecutor,
};
