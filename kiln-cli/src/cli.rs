//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use kiln_core::IsolationMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Run as worker process (internal use)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// System classpath of the worker process (used with --worker)
    #[arg(long, value_name = "CLASSPATH", hide = true)]
    pub classpath: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Settings shared by every command that spawns a worker
#[derive(clap::Args, Debug, Clone, Default)]
pub struct WorkerArgs {
    /// Code isolation of the worker: shared, isolated
    #[arg(long, value_name = "MODE")]
    pub isolation: Option<IsolationMode>,

    /// Application classpath entry (repeatable)
    #[arg(long = "app-classpath", value_name = "PATH")]
    pub application_classpath: Vec<PathBuf>,

    /// Module prefix the application may see from the implementation (repeatable)
    #[arg(long = "share", value_name = "MODULE")]
    pub shared_modules: Vec<String>,

    /// Log level of the worker process
    #[arg(long, value_name = "LEVEL")]
    pub worker_log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one action in a worker process and print what it sends back
    Run {
        /// Action kind, see `kiln actions`
        #[arg(long, value_name = "KIND")]
        action: String,

        /// JSON parameters of the action (example: --params='{"messages":["ready"]}')
        #[arg(long, value_name = "JSON")]
        params: Option<String>,

        /// JSON value sent to the worker before waiting for its output (repeatable)
        #[arg(long, value_name = "JSON")]
        input: Vec<String>,

        #[command(flatten)]
        worker: WorkerArgs,
    },

    /// Report how modules resolve inside a worker process
    Probe {
        /// Module to resolve, such as `logging.Logger` (repeatable)
        #[arg(long = "module", value_name = "MODULE", required = true)]
        modules: Vec<String>,

        #[command(flatten)]
        worker: WorkerArgs,
    },

    /// List the actions a worker process can run
    Actions,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration in use
    Show {
        /// Path to configuration file (optional, uses default loading logic)
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,

        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_worker_mode_flags() {
        let cli = Cli::parse_from(["kiln", "--worker", "--classpath", "/opt/kiln/lib"]);
        assert!(cli.worker);
        assert_eq!(cli.classpath.as_deref(), Some("/opt/kiln/lib"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_probe_arguments() {
        let cli = Cli::parse_from([
            "kiln",
            "probe",
            "--module",
            "logging.Logger",
            "--module",
            "app.Main",
            "--isolation",
            "isolated",
            "--share",
            "logging",
        ]);
        match cli.command {
            Some(Commands::Probe { modules, worker }) => {
                assert_eq!(modules, vec!["logging.Logger", "app.Main"]);
                assert_eq!(worker.isolation, Some(IsolationMode::Isolated));
                assert_eq!(worker.shared_modules, vec!["logging"]);
            }
            _ => panic!("expected probe command"),
        }
    }

    #[test]
    fn test_unknown_isolation_is_rejected() {
        let parsed = Cli::try_parse_from(["kiln", "probe", "--module", "a.B", "--isolation", "sandboxed"]);
        assert!(parsed.is_err());
    }
}
