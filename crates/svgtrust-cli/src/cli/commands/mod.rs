use super::args::{Cli, Command};

pub mod fetch;
pub mod inspect;
pub mod sanitize;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Fetch(args) => fetch::run(args).await,
        Command::InspectHeader(args) => inspect::run(args),
        Command::Sanitize(args) => sanitize::run(args),
    }
}
