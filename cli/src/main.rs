use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod command;
mod config;
mod util;

use command::*;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    global: Global,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct Global {
    /// Config file to use instead of searching for `.farme/config.toml` or `farme.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named connection to use instead of the configured default.
    #[arg(long, global = true)]
    pub connection: Option<String>,

    /// Log executed SQL and migration progress.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a model, controller, views and migration for an entity.
    #[command(name = "make:crud")]
    MakeCrud(MakeCrud),
    /// Create a new up/down migration pair.
    #[command(name = "make:migration")]
    MakeMigration(MakeMigration),
    /// Run all pending migrations.
    #[command(name = "migrate")]
    Up(Up),
    /// Show applied and pending migrations.
    #[command(name = "migrate:status")]
    Status(Status),
    /// Roll back the most recent migrations.
    #[command(name = "migrate:rollback")]
    Down(Down),
    /// Roll back every migration and drop the migrations table.
    #[command(name = "migrate:reset")]
    Reset(Reset),
    /// Print the introspected columns of a table.
    #[command(name = "db:columns")]
    Info(Info),
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    use Command::*;
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    let global = &cli.global;
    match cli.command {
        MakeCrud(c) => c.run(global),
        MakeMigration(m) => m.run(global),
        Up(up) => up.run(global),
        Status(status) => status.run(global),
        Down(down) => down.run(global),
        Reset(reset) => reset.run(global),
        Info(info) => info.run(global),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::parse_from(["farme", "make:crud", "Post", "--admin", "--connection", "reporting"]);
        assert_eq!(cli.global.connection.as_deref(), Some("reporting"));
        assert!(matches!(cli.command, Command::MakeCrud(_)));

        let cli = Cli::parse_from(["farme", "migrate:rollback", "3"]);
        assert!(matches!(cli.command, Command::Down(_)));

        let cli = Cli::parse_from(["farme", "-v", "make:migration", "create_posts_table", "create"]);
        assert!(cli.global.verbose);
        assert!(matches!(cli.command, Command::MakeMigration(_)));
    }
}
