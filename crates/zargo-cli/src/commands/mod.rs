mod fetch;
mod update;

use miette::Result;

use crate::cli::{Cli, Command};

pub fn dispatch(args: Cli) -> Result<()> {
    match args.command {
        Command::Fetch { offline } => fetch::run(offline, args.verbose),
        Command::Update { alias } => update::run(alias.as_deref(), args.verbose),
    }
}
