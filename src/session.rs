//! Session Module
//!
//! Replays an ordered list of directives against each host.
//!
//! ## Error scoping
//! - Connect, framing, server and unsupported-reply errors end the current
//!   host: a one-line diagnostic is printed, the host's store is dropped and
//!   the run continues with the next host.
//! - Template errors and output I/O errors end the whole run.

use std::io::Write;

use crate::config::Config;
use crate::error::{ProbeError, Result};
use crate::host::HostAddr;
use crate::info::{decode_info, is_info_command};
use crate::network;
use crate::protocol::ReplyFrame;
use crate::store::ResultStore;
use crate::template::render;

/// One step replayed against every host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Send a command on a fresh connection
    Command(String),

    /// Print `hostport: response`
    Print,

    /// Print a rendered template
    Format(String),
}

/// How a single host's directive list ended
#[derive(Debug)]
pub enum HostOutcome {
    /// Every directive ran
    Completed,

    /// A host-scoped error stopped the remaining directives
    Aborted(ProbeError),
}

/// Apply one reply to the store
///
/// Error and unsupported replies become errors; everything else updates
/// `response`, and bulk replies to `info` are decoded into fields.
pub fn apply_reply(command: &str, frame: ReplyFrame, store: &mut ResultStore) -> Result<()> {
    match frame {
        ReplyFrame::ErrorReply(message) => Err(ProbeError::ServerError(message)),
        ReplyFrame::Unsupported(marker) => Err(ProbeError::UnsupportedReply(marker)),
        ReplyFrame::Bulk(_) if is_info_command(command) => {
            let text = frame.text().into_owned();
            store.extend(decode_info(&text));
            store.set_response(text);
            Ok(())
        }
        frame => {
            store.set_response(frame.text());
            Ok(())
        }
    }
}

/// Run `directives` against one host with a fresh store
///
/// Command failures are reported to `out` and end this host only; `Err` is
/// returned for template and output errors, which end the run.
pub fn run_host<W: Write + ?Sized>(
    addr: &HostAddr,
    directives: &[Directive],
    config: &Config,
    out: &mut W,
) -> Result<HostOutcome> {
    let mut store = ResultStore::for_host(addr);

    for directive in directives {
        match directive {
            Directive::Command(command) => {
                let applied = network::execute(addr, command, config)
                    .and_then(|frame| apply_reply(command, frame, &mut store));

                if let Err(e) = applied {
                    tracing::warn!("Host {} aborted: {}", addr, e);
                    writeln!(out, "{}: {}", addr, e)?;
                    return Ok(HostOutcome::Aborted(e));
                }
            }
            Directive::Print => {
                writeln!(out, "{}: {}", addr, store.response())?;
            }
            Directive::Format(template) => {
                let line = render(template, &store)?;
                writeln!(out, "{}", line)?;
            }
        }
    }

    Ok(HostOutcome::Completed)
}

/// Totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub aborted: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &HostOutcome) {
        match outcome {
            HostOutcome::Completed => self.completed += 1,
            HostOutcome::Aborted(_) => self.aborted += 1,
        }
    }
}

/// Default number of hosts contacted at once in parallel mode
pub const DEFAULT_WORKERS: usize = 16;

/// Runs a directive list across many hosts
#[derive(Debug, Clone)]
pub struct Runner {
    config: Config,
    directives: Vec<Directive>,
    parallel: bool,

    /// Upper bound on concurrent hosts in parallel mode
    workers: usize,
}

impl Runner {
    pub fn new(config: Config, directives: Vec<Directive>) -> Self {
        Self {
            config,
            directives,
            parallel: false,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Run hosts concurrently; output is still written in host order
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Limit how many hosts run at once in parallel mode (at least one)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Run every host, writing all output to `out`
    ///
    /// Stops at the first run-fatal error, after writing the output produced
    /// up to that point.
    pub fn run<W: Write + ?Sized>(&self, hosts: &[HostAddr], out: &mut W) -> Result<RunSummary> {
        tracing::debug!(
            "Running {} directives on {} hosts (parallel: {})",
            self.directives.len(),
            hosts.len(),
            self.parallel
        );

        let summary = if self.parallel {
            self.run_parallel(hosts, out)?
        } else {
            self.run_sequential(hosts, out)?
        };

        tracing::debug!(
            "Run finished: {} completed, {} aborted",
            summary.completed,
            summary.aborted
        );
        Ok(summary)
    }

    fn run_sequential<W: Write + ?Sized>(
        &self,
        hosts: &[HostAddr],
        out: &mut W,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for addr in hosts {
            let outcome = run_host(addr, &self.directives, &self.config, out)?;
            summary.record(&outcome);
        }
        Ok(summary)
    }

    fn run_parallel<W: Write + ?Sized>(&self, hosts: &[HostAddr], out: &mut W) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        // Hosts run in batches of at most `workers` threads
        for batch in hosts.chunks(self.workers) {
            for (buffer, outcome) in self.run_batch(batch) {
                out.write_all(&buffer)?;
                summary.record(&outcome?);
            }
        }
        Ok(summary)
    }

    fn run_batch(&self, batch: &[HostAddr]) -> Vec<(Vec<u8>, Result<HostOutcome>)> {
        let directives = &self.directives;
        let config = &self.config;

        // Each host writes into its own buffer; nothing is shared between workers
        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|addr| {
                    scope.spawn(move |_| {
                        let mut buffer = Vec::new();
                        let outcome = run_host(addr, directives, config, &mut buffer);
                        (buffer, outcome)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
        .unwrap_or_else(|e| std::panic::resume_unwind(e))
    }
}
