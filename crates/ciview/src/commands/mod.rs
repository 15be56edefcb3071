//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod connections;
pub mod devices;
pub mod logs;
pub mod profiles;
pub mod properties;
pub mod util;
pub mod watch;

use ciview_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Discover => connections::discover(controller, global).await,
        Command::Connections(args) => connections::handle(controller, args, global).await,
        Command::Profiles => profiles::list(controller, global).await,
        Command::SetProfile(args) => profiles::set(controller, args, global).await,
        Command::Properties => properties::list(controller, global).await,
        Command::Subscribe(args) => properties::subscribe(controller, args, global).await,
        Command::Unsubscribe(args) => properties::unsubscribe(controller, args, global).await,
        Command::Logs(args) => logs::handle(controller, args, global).await,
        Command::Watch(args) => watch::handle(controller, args, global).await,
        // Devices and Completions are handled before dispatch
        Command::Devices(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not use a controller".into(),
        }),
    }
}
