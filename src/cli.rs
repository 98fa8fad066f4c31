//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Acquire publications into a managed library.
///
/// Local files and catalog entries are copied or downloaded, opened,
/// registered in the catalog and given a cover thumbnail.
#[derive(Parser, Debug)]
#[command(name = "acquirer")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/acquirer/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Library directory, overriding the config file
    #[arg(long, global = true, value_name = "DIR")]
    pub library_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Import a local file (path or file:// URI)
    Import {
        /// File to import
        source: String,

        /// Canonical URL of the content; required for bare manifests
        #[arg(long, value_name = "URL")]
        source_url: Option<String>,
    },

    /// Download and register a catalog entry
    Fetch {
        /// Publication JSON file, or `-` for stdin
        publication: PathBuf,
    },

    /// Execute a raw work input payload
    Run {
        /// Work input JSON file, or `-` for stdin
        input: PathBuf,
    },

    /// Print the catalog as JSON lines
    List,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_import_parses_source() {
        let args = Args::try_parse_from(["acquirer", "import", "/tmp/book.epub"]).unwrap();
        assert_eq!(
            args.command,
            Command::Import {
                source: "/tmp/book.epub".to_string(),
                source_url: None,
            }
        );
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_import_with_source_url() {
        let args = Args::try_parse_from([
            "acquirer",
            "import",
            "manifest.json",
            "--source-url",
            "https://example.com/manifest.json",
        ])
        .unwrap();
        let Command::Import { source_url, .. } = args.command else {
            panic!("expected import");
        };
        assert_eq!(source_url.as_deref(), Some("https://example.com/manifest.json"));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "acquirer",
            "list",
            "-vv",
            "--library-dir",
            "/srv/books",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.library_dir, Some(PathBuf::from("/srv/books")));
        assert_eq!(args.command, Command::List);
    }

    #[test]
    fn test_cli_fetch_accepts_stdin_marker() {
        let args = Args::try_parse_from(["acquirer", "fetch", "-"]).unwrap();
        assert_eq!(
            args.command,
            Command::Fetch {
                publication: PathBuf::from("-")
            }
        );
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let err = Args::try_parse_from(["acquirer", "-q", "-v", "list"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_subcommand_required() {
        let err = Args::try_parse_from(["acquirer"]).unwrap_err();
        assert!(matches!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                | clap::error::ErrorKind::MissingSubcommand
        ));
    }

    #[test]
    fn test_cli_import_requires_source() {
        let err = Args::try_parse_from(["acquirer", "import"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["acquirer", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["acquirer", "--invalid-flag", "list"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
