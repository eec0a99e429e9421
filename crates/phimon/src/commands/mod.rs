//! Command dispatch: bridges CLI args -> engine calls -> output formatting.

pub mod sensors;
pub mod session;
pub mod watch;

use phimon_config::ServerDefaults;
use phimon_core::{Controller, EnginePhase};

use crate::cli::{Command, OutputFormat};
use crate::error::CliError;

/// Settings every handler needs besides its own arguments.
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
    pub color: bool,
    /// `[server]` section of the config file.
    pub server: ServerDefaults,
}

pub async fn dispatch(cmd: Command, controller: &Controller, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(controller, args, ctx).await,
        Command::Connect(args) => session::connect(controller, args, ctx).await,
        Command::Disconnect => session::disconnect(controller, ctx).await,
        Command::Status => session::status(controller, ctx).await,
        Command::Sensors(args) => sensors::handle(controller, args, ctx).await,
    }
}

/// Restore the saved session and insist that it came up.
///
/// On failure the engine is already stopped; a recorded failure message
/// (unreachable server and the like) is surfaced instead of the generic
/// "no session" error.
pub(crate) async fn require_session(controller: &Controller) -> Result<(), CliError> {
    if controller.start().await == EnginePhase::Connected {
        return Ok(());
    }
    match controller.last_error() {
        Some(message) => Err(CliError::Unreachable { message }),
        None => Err(CliError::NoSession),
    }
}
