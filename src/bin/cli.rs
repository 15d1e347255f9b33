//! kvprobe CLI
//!
//! Sends commands to a list of servers and prints the replies.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use kvprobe::host::parse_hosts;
use kvprobe::session::DEFAULT_WORKERS;
use kvprobe::{Config, Directive, ProbeError, Runner};
use tracing_subscriber::{fmt, EnvFilter};

const FORMAT_HELP: &str = "\
Notes:
  hostlist is a list of hostname:port separated by space

Formatting:
  A format specifier looks like %{thing}
  The following specifiers are always available:
    host      The hostname we sent the request to
    port      The port we sent the request to
    hostport  A concatenation of host:port
    response  The whole response to your request
  After an 'info' command, any key from the info report is available too.

Examples:
  kvprobe -c 'SET mykey Hello' -p localhost:6379
  kvprobe -c 'GET mykey' -p localhost:6379
  kvprobe -c info -f '%{uptime_in_seconds}' localhost:6379 localhost:6380
  kvprobe -c info -f '%{hostport}: %{role}' localhost:6379 localhost:6380";

/// kvprobe
#[derive(Parser, Debug)]
#[command(name = "kvprobe")]
#[command(about = "Send a command to one or more Redis-compatible servers")]
#[command(version)]
#[command(after_help = FORMAT_HELP)]
struct Args {
    /// The command to send to each server (repeatable)
    #[arg(short = 'c', long = "command", value_name = "COMMAND", action = ArgAction::Append)]
    commands: Vec<String>,

    /// Output the last response as 'hostport: response' (repeatable)
    #[arg(
        short = 'p',
        long = "print",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "",
        value_parser = print_takes_no_value,
        action = ArgAction::Append
    )]
    print: Vec<String>,

    /// Output with formatting, e.g. '%{hostport}: %{role}' (repeatable)
    #[arg(short = 'f', long = "format", value_name = "TEMPLATE", action = ArgAction::Append)]
    formats: Vec<String>,

    /// Run hosts in parallel
    #[arg(short = 'X', long)]
    parallel: bool,

    /// Maximum hosts contacted at once with -X
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Connect timeout in milliseconds (0 disables)
    #[arg(long, default_value = "3000")]
    connect_timeout_ms: u64,

    /// Read timeout in milliseconds (0 disables)
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Maximum reply size in bytes
    #[arg(long, default_value = "4194304")]
    max_frame_size: usize,

    /// Servers as hostname:port
    #[arg(value_name = "HOST:PORT")]
    hosts: Vec<String>,
}

/// `-p` is a bare flag; `-p=<anything>` is rejected rather than ignored
fn print_takes_no_value(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Ok(String::new())
    } else {
        Err(format!("-p takes no value (got {:?})", value))
    }
}

impl Args {
    fn config(&self) -> kvprobe::Result<Config> {
        if self.max_frame_size == 0 {
            return Err(ProbeError::Config(
                "max frame size must be greater than zero".to_string(),
            ));
        }

        Ok(Config::builder()
            .connect_timeout_ms(self.connect_timeout_ms)
            .read_timeout_ms(self.read_timeout_ms)
            .max_frame_size(self.max_frame_size)
            .build())
    }

    /// Rebuild the `-c`/`-p`/`-f` sequence in command-line order
    fn directives(&self, matches: &ArgMatches) -> Vec<Directive> {
        let mut ordered: Vec<(usize, Directive)> = Vec::new();

        if let Some(indices) = matches.indices_of("commands") {
            ordered.extend(
                indices
                    .zip(&self.commands)
                    .map(|(i, command)| (i, Directive::Command(command.clone()))),
            );
        }
        if let Some(indices) = matches.indices_of("print") {
            ordered.extend(indices.zip(&self.print).map(|(i, _)| (i, Directive::Print)));
        }
        if let Some(indices) = matches.indices_of("formats") {
            ordered.extend(
                indices
                    .zip(&self.formats)
                    .map(|(i, template)| (i, Directive::Format(template.clone()))),
            );
        }

        ordered.sort_by_key(|(i, _)| *i);
        ordered.into_iter().map(|(_, directive)| directive).collect()
    }
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the replies
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let matches = Args::command().get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let (hosts, rejected) = parse_hosts(args.hosts.iter().map(String::as_str));
    for e in &rejected {
        println!("{}", e);
    }

    if hosts.is_empty() {
        println!("No hosts specified");
        return ExitCode::FAILURE;
    }

    let runner = Runner::new(config, args.directives(&matches)).parallel(args.parallel)
        .workers(args.workers);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match runner.run(&hosts, &mut out) {
        Ok(summary) => {
            tracing::info!(
                "{} hosts completed, {} aborted",
                summary.completed,
                summary.aborted
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Run aborted: {}", e);
            let _ = writeln!(out, "{}", e);
            ExitCode::FAILURE
        }
    }
}
