mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rtbuffer", version, about = "Real-time sample and event buffer")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
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
    fn parses_wait_subcommand() {
        let cli = Cli::try_parse_from([
            "rtbuffer",
            "wait",
            "--addr",
            "127.0.0.1:1972",
            "--samples",
            "150",
            "--timeout",
            "50ms",
        ])
        .expect("wait args should parse");

        let Command::Wait(args) = cli.command else {
            panic!("expected wait command");
        };
        assert_eq!(args.samples, 150);
        assert_eq!(args.events, 0);
        assert_eq!(args.connect.addr, "127.0.0.1:1972");
    }

    #[test]
    fn parses_serve_with_unix_socket() {
        let cli = Cli::try_parse_from(["rtbuffer", "serve", "--listen", "unix:/tmp/rtb.sock"])
            .expect("serve args should parse");
        assert!(matches!(cli.command, Command::Serve(_)));
    }

    #[test]
    fn rejects_non_numeric_threshold() {
        let err = Cli::try_parse_from(["rtbuffer", "wait", "--samples", "many"])
            .expect_err("non-numeric samples should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
