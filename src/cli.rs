use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::engine::{ErrorPolicy, Selection};
use crate::steps::TaskGroup;

#[derive(Parser)]
#[command(name = "benchforge")]
#[command(version)]
#[command(about = "Provision a Frappe/ERPNext server", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (JSON or TOML)
    #[arg(short, long, global = true, env = "BENCHFORGE_CONFIG")]
    pub config: Option<String>,

    /// Defaults to the interactive menu
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pick task groups from a numbered menu
    Menu,

    /// Run the provisioning pipeline
    Run(RunArgs),

    /// Show which steps would run and why others are skipped
    Plan(SelectionArgs),

    /// Validate the config and check for required tools
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Default)]
pub struct SelectionArgs {
    /// Only run steps from these task groups (comma-separated)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub group: Vec<GroupArg>,

    /// Only run these steps (comma-separated ids, see `plan`)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip these steps (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,
}

impl From<SelectionArgs> for Selection {
    fn from(args: SelectionArgs) -> Self {
        Self {
            groups: args.group.into_iter().map(TaskGroup::from).collect(),
            only: args.only,
            skip: args.skip,
        }
    }
}

#[derive(Parser)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// What to do when a command fails (default: config `on_error`)
    #[arg(long, value_enum)]
    pub on_error: Option<ErrorPolicyArg>,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GroupArg {
    /// Packages, SSH, sysctl and swap
    Server,
    /// Python, MariaDB, Node.js, wkhtmltopdf and tools
    Database,
    /// The bench CLI
    Bench,
    /// Bench workspace and apps
    Apps,
    /// Site creation and app install
    Site,
    /// Let's Encrypt certificate
    Ssl,
    /// Supervisor and nginx
    Production,
}

impl From<GroupArg> for TaskGroup {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Server => TaskGroup::ServerConfig,
            GroupArg::Database => TaskGroup::DatabaseSystem,
            GroupArg::Bench => TaskGroup::InstallBench,
            GroupArg::Apps => TaskGroup::InitBench,
            GroupArg::Site => TaskGroup::CreateSite,
            GroupArg::Ssl => TaskGroup::Ssl,
            GroupArg::Production => TaskGroup::Production,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicyArg {
    /// Record failed commands and keep going
    Continue,
    /// Stop at the first failed command
    FailFast,
}

impl From<ErrorPolicyArg> for ErrorPolicy {
    fn from(arg: ErrorPolicyArg) -> Self {
        match arg {
            ErrorPolicyArg::Continue => ErrorPolicy::Continue,
            ErrorPolicyArg::FailFast => ErrorPolicy::FailFast,
        }
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
    fn test_no_subcommand_means_menu() {
        let cli = Cli::try_parse_from(["benchforge"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "benchforge",
            "-vv",
            "run",
            "--group",
            "server,database",
            "--skip",
            "swap",
            "--on-error",
            "fail-fast",
            "--dry-run",
            "--yes",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.on_error, Some(ErrorPolicyArg::FailFast));
        assert!(args.dry_run && args.yes);

        let selection = Selection::from(args.selection);
        assert_eq!(
            selection.groups,
            vec![TaskGroup::ServerConfig, TaskGroup::DatabaseSystem]
        );
        assert_eq!(selection.skip, vec!["swap"]);
    }

    #[test]
    fn test_every_group_is_reachable() {
        let groups: Vec<TaskGroup> = GroupArg::value_variants()
            .iter()
            .map(|g| TaskGroup::from(*g))
            .collect();
        assert_eq!(groups, TaskGroup::ALL.to_vec());
    }
}
