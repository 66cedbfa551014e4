//! Command-line interface for kiddoz-enroll.
//!
//! This module provides the CLI structure for the `kiddoz-enroll` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, EnrollCommand, PlansCommand, ShowCommand, StudentsCommand};

/// kiddoz-enroll - Enroll children into KiddoZ care plans
///
/// Drives the enrollment workflow from the command line and inspects stored
/// enrollments.
#[derive(Debug, Parser)]
#[command(name = "kiddoz-enroll")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the care plans on offer
    Plans(PlansCommand),

    /// Enroll a child through the full workflow
    Enroll(Box<EnrollCommand>),

    /// List enrolled students
    Students(StudentsCommand),

    /// Show one enrolled student
    Show(ShowCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "kiddoz-enroll");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["kiddoz-enroll", "-q", "plans"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);

        let cli = Cli::try_parse_from(["kiddoz-enroll", "-vv", "plans"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_plans_json() {
        let cli = Cli::try_parse_from(["kiddoz-enroll", "plans", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Plans(PlansCommand { json: true })));
    }

    #[test]
    fn test_parse_enroll() {
        let cli = Cli::try_parse_from([
            "kiddoz-enroll",
            "enroll",
            "--user",
            "parent-1",
            "--plan",
            "growth",
            "--name",
            "Noah Smith",
            "--age",
            "4",
            "--gender",
            "boy",
            "--guardian-phone",
            "555-0000",
            "--face",
            "face.jpg",
            "--body",
            "body.jpg",
        ])
        .unwrap();

        let Command::Enroll(cmd) = cli.command else {
            panic!("expected enroll");
        };
        assert_eq!(cmd.user, "parent-1");
        assert_eq!(cmd.plan.as_deref(), Some("growth"));
        assert_eq!(cmd.face, PathBuf::from("face.jpg"));
    }

    #[test]
    fn test_parse_enroll_negative_age() {
        let cli = Cli::try_parse_from([
            "kiddoz-enroll",
            "enroll",
            "-u",
            "p",
            "--name",
            "Noah",
            "--age",
            "-1",
            "--gender",
            "boy",
            "--guardian-phone",
            "555-0000",
            "--face",
            "f",
            "--body",
            "b",
        ])
        .unwrap();
        let Command::Enroll(cmd) = cli.command else {
            panic!("expected enroll");
        };
        assert_eq!(cmd.age, "-1");
    }

    #[test]
    fn test_enroll_requires_captures() {
        let result = Cli::try_parse_from([
            "kiddoz-enroll",
            "enroll",
            "--user",
            "p",
            "--name",
            "Noah",
            "--age",
            "4",
            "--gender",
            "boy",
            "--guardian-phone",
            "555",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_students_by_guardian() {
        let cli =
            Cli::try_parse_from(["kiddoz-enroll", "students", "--guardian", "parent-1"]).unwrap();
        let Command::Students(cmd) = cli.command else {
            panic!("expected students");
        };
        assert_eq!(cmd.guardian.as_deref(), Some("parent-1"));
        assert_eq!(cmd.limit, 20);
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::try_parse_from(["kiddoz-enroll", "show", "K-4821", "--json"]).unwrap();
        let Command::Show(cmd) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(cmd.student_id, "K-4821");
        assert!(cmd.json);
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from([
            "kiddoz-enroll",
            "-c",
            "/custom/config.toml",
            "config",
            "validate",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: None })
        ));
    }
}
