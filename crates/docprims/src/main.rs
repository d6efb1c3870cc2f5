mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "docprims", version, about = "Document schema validation CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_validate_subcommand() {
        let cli = Cli::try_parse_from([
            "docprims",
            "validate",
            "--schema",
            "person.schema.json",
            "a.json",
            "b.json",
            "--strict",
        ])
        .expect("validate args should parse");

        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.documents.len(), 2);
                assert!(args.registry.strict);
                assert!(!args.registry.offline);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn validate_requires_documents() {
        let err = Cli::try_parse_from(["docprims", "validate", "--schema", "s.json"])
            .expect_err("missing documents should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_check_with_schema_dir() {
        let cli = Cli::try_parse_from([
            "docprims",
            "--format",
            "json",
            "check",
            "s.json",
            "--schemas",
            "/tmp/schemas",
            "--offline",
        ])
        .expect("check args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        match cli.command {
            Command::Check(args) => {
                assert_eq!(
                    args.registry.schemas.as_deref(),
                    Some(std::path::Path::new("/tmp/schemas"))
                );
                assert!(args.registry.offline);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
