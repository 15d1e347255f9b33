//! Session Tests
//!
//! End-to-end runs against an in-process fake server.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::thread::{self, JoinHandle};

use kvprobe::protocol::ReplyFrame;
use kvprobe::session::{apply_reply, run_host, HostOutcome, RunSummary};
use kvprobe::{Config, Directive, HostAddr, ProbeError, ProtocolError, ResultStore, Runner};

// =============================================================================
// Helper Functions
// =============================================================================

const INFO_MASTER: &str = "# Server\r\nredis_version:7.2.4\r\nuptime_in_seconds:120\r\n\r\n# Replication\r\nrole:master\r\n";
const INFO_NO_ROLE: &str = "# Server\r\nredis_version:7.2.4\r\nuptime_in_seconds:7\r\n";

fn bulk(payload: &str) -> Vec<u8> {
    format!("${}\r\n{}\r\n", payload.len(), payload).into_bytes()
}

fn test_config() -> Config {
    Config::builder()
        .connect_timeout_ms(2000)
        .read_timeout_ms(2000)
        .build()
}

/// Accept `connections` connections, answer each command with `reply`, and
/// return the commands received
fn spawn_server<F>(connections: usize, reply: F) -> (HostAddr, JoinHandle<Vec<String>>)
where
    F: Fn(&str) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut received = Vec::new();
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let command = line.trim_end_matches("\r\n").to_string();

            // Dribble the reply out to exercise reassembly
            for chunk in reply(&command).chunks(7) {
                stream.write_all(chunk).unwrap();
                stream.flush().unwrap();
            }
            received.push(command);
        }
        received
    });

    (HostAddr::new("127.0.0.1", port), handle)
}

/// An address with nothing listening on it
fn closed_addr() -> HostAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    HostAddr::new("127.0.0.1", port)
}

fn output_of(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer).unwrap()
}

// =============================================================================
// Single Host Tests
// =============================================================================

#[test]
fn test_info_then_format() {
    let (addr, server) = spawn_server(1, |_| bulk(INFO_MASTER));
    let directives = vec![
        Directive::Command("info".to_string()),
        Directive::Format("%{hostport} %{role} up %{uptime_in_seconds}s".to_string()),
    ];

    let mut out = Vec::new();
    let outcome = run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    assert!(matches!(outcome, HostOutcome::Completed));
    assert_eq!(output_of(out), format!("{} master up 120s\n", addr));
    assert_eq!(server.join().unwrap(), vec!["info".to_string()]);
}

#[test]
fn test_status_then_print() {
    let (addr, server) = spawn_server(1, |_| b"+OK\r\n".to_vec());
    let directives = vec![Directive::Command("SET mykey Hello".to_string()), Directive::Print];

    let mut out = Vec::new();
    run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    assert_eq!(output_of(out), format!("{}: +OK\n", addr));
    assert_eq!(server.join().unwrap(), vec!["SET mykey Hello".to_string()]);
}

#[test]
fn test_one_connection_per_command() {
    let (addr, server) = spawn_server(2, |command| match command {
        "GET mykey" => bulk("Hello"),
        _ => b"+OK\r\n".to_vec(),
    });
    let directives = vec![
        Directive::Command("SET mykey Hello".to_string()),
        Directive::Print,
        Directive::Command("GET mykey".to_string()),
        Directive::Print,
        Directive::Format("%{host}/%{port}: %{response}".to_string()),
    ];

    let mut out = Vec::new();
    run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    assert_eq!(
        output_of(out),
        format!(
            "{addr}: +OK\n{addr}: Hello\n127.0.0.1/{port}: Hello\n",
            addr = addr,
            port = addr.port()
        )
    );
    assert_eq!(server.join().unwrap().len(), 2);
}

#[test]
fn test_absent_reply_prints_nil() {
    let (addr, server) = spawn_server(1, |_| b"$-1\r\n".to_vec());
    let directives = vec![Directive::Command("GET missing".to_string()), Directive::Print];

    let mut out = Vec::new();
    run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    assert_eq!(output_of(out), format!("{}: (nil)\n", addr));
    server.join().unwrap();
}

#[test]
fn test_error_reply_aborts_host() {
    let (addr, server) = spawn_server(1, |_| b"-ERR unknown command 'BOGUS'\r\n".to_vec());
    let directives = vec![
        Directive::Command("BOGUS".to_string()),
        Directive::Print,
        Directive::Command("PING".to_string()),
    ];

    let mut out = Vec::new();
    let outcome = run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    match outcome {
        HostOutcome::Aborted(ProbeError::ServerError(message)) => {
            assert_eq!(message, "ERR unknown command 'BOGUS'");
        }
        other => panic!("Expected server error, got {:?}", other),
    }
    assert_eq!(
        output_of(out),
        format!("{}: Invalid command: ERR unknown command 'BOGUS'\n", addr)
    );
    // PING never reached the server
    assert_eq!(server.join().unwrap(), vec!["BOGUS".to_string()]);
}

#[test]
fn test_unsupported_reply_aborts_host() {
    let (addr, server) = spawn_server(1, |_| b":1\r\n".to_vec());
    let directives = vec![Directive::Command("INCR counter".to_string()), Directive::Print];

    let mut out = Vec::new();
    let outcome = run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    assert!(matches!(
        outcome,
        HostOutcome::Aborted(ProbeError::UnsupportedReply(b':'))
    ));
    assert_eq!(output_of(out), format!("{}: Unsupported reply type ':'\n", addr));
    server.join().unwrap();
}

#[test]
fn test_connect_failure_aborts_host() {
    let addr = closed_addr();
    let directives = vec![Directive::Command("PING".to_string()), Directive::Print];

    let mut out = Vec::new();
    let outcome = run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    assert!(matches!(outcome, HostOutcome::Aborted(ProbeError::Connect { .. })));
    assert!(output_of(out).starts_with(&format!("{}: Could not connect", addr)));
}

#[test]
fn test_truncated_reply_aborts_host() {
    let (addr, server) = spawn_server(1, |_| b"$10\r\nshort".to_vec());
    let directives = vec![Directive::Command("GET k".to_string())];

    let mut out = Vec::new();
    let outcome = run_host(&addr, &directives, &test_config(), &mut out).unwrap();

    assert!(matches!(
        outcome,
        HostOutcome::Aborted(ProbeError::Protocol(ProtocolError::TruncatedFrame { .. }))
    ));
    server.join().unwrap();
}

#[test]
fn test_missing_field_is_fatal() {
    let addr = closed_addr();
    let directives = vec![Directive::Format("%{role}".to_string())];

    let mut out = Vec::new();
    let result = run_host(&addr, &directives, &test_config(), &mut out);

    assert!(matches!(result, Err(ProbeError::MissingField(ref name)) if name == "role"));
    assert!(out.is_empty());
}

// =============================================================================
// Reply Application Tests
// =============================================================================

#[test]
fn test_info_decoding_requires_literal_command() {
    let mut store = ResultStore::for_host(&HostAddr::new("localhost", 6379));
    apply_reply("INFO", ReplyFrame::Bulk(INFO_MASTER.into()), &mut store).unwrap();

    assert!(!store.contains("role"));
    assert_eq!(store.response(), INFO_MASTER);

    apply_reply("info", ReplyFrame::Bulk(INFO_MASTER.into()), &mut store).unwrap();
    assert_eq!(store.get("role"), Some("master"));
}

#[test]
fn test_status_to_info_command_is_not_decoded() {
    let mut store = ResultStore::for_host(&HostAddr::new("localhost", 6379));
    apply_reply("info", ReplyFrame::Status("role:master".into()), &mut store).unwrap();

    assert!(!store.contains("role"));
    assert_eq!(store.response(), "+role:master");
}

// =============================================================================
// Runner Tests
// =============================================================================

#[test]
fn test_runner_continues_after_host_error() {
    let (bad, bad_server) = spawn_server(1, |_| b"-ERR nope\r\n".to_vec());
    let (good, good_server) = spawn_server(1, |_| b"+PONG\r\n".to_vec());
    let runner = Runner::new(
        test_config(),
        vec![Directive::Command("PING".to_string()), Directive::Print],
    );

    let mut out = Vec::new();
    let summary = runner.run(&[bad.clone(), good.clone()], &mut out).unwrap();

    assert_eq!(summary, RunSummary { completed: 1, aborted: 1 });
    assert_eq!(
        output_of(out),
        format!("{}: Invalid command: ERR nope\n{}: +PONG\n", bad, good)
    );
    bad_server.join().unwrap();
    good_server.join().unwrap();
}

#[test]
fn test_runner_uses_fresh_store_per_host() {
    let (first, first_server) = spawn_server(1, |_| bulk(INFO_MASTER));
    let (second, second_server) = spawn_server(1, |_| bulk(INFO_NO_ROLE));
    let runner = Runner::new(
        test_config(),
        vec![
            Directive::Command("info".to_string()),
            Directive::Format("%{hostport}: %{role}".to_string()),
        ],
    );

    let mut out = Vec::new();
    let result = runner.run(&[first.clone(), second], &mut out);

    // The second host must not see the first host's role
    assert!(matches!(result, Err(ProbeError::MissingField(ref name)) if name == "role"));
    assert_eq!(output_of(out), format!("{}: master\n", first));
    first_server.join().unwrap();
    second_server.join().unwrap();
}

#[test]
fn test_runner_stops_on_missing_field() {
    let hosts = [closed_addr(), closed_addr()];
    let runner = Runner::new(test_config(), vec![Directive::Format("%{nope}".to_string())]);

    let mut out = Vec::new();
    let result = runner.run(&hosts, &mut out);

    assert!(matches!(result, Err(ProbeError::MissingField(ref name)) if name == "nope"));
    assert!(out.is_empty());
}

#[test]
fn test_parallel_runner_keeps_host_order() {
    let servers: Vec<_> = (0..4)
        .map(|i| spawn_server(1, move |_| format!("+reply-{}\r\n", i).into_bytes()))
        .collect();
    let hosts: Vec<HostAddr> = servers.iter().map(|(addr, _)| addr.clone()).collect();

    let runner = Runner::new(
        test_config(),
        vec![Directive::Command("PING".to_string()), Directive::Print],
    )
    .parallel(true);

    let mut out = Vec::new();
    let summary = runner.run(&hosts, &mut out).unwrap();

    let expected: String = hosts
        .iter()
        .enumerate()
        .map(|(i, addr)| format!("{}: +reply-{}\n", addr, i))
        .collect();
    assert_eq!(summary, RunSummary { completed: 4, aborted: 0 });
    assert_eq!(output_of(out), expected);

    for (_, server) in servers {
        server.join().unwrap();
    }
}

#[test]
fn test_parallel_runner_bounds_concurrent_hosts() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let servers: Vec<_> = (0..5)
        .map(|i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            spawn_server(1, move |_| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                format!("+reply-{}\r\n", i).into_bytes()
            })
        })
        .collect();
    let hosts: Vec<HostAddr> = servers.iter().map(|(addr, _)| addr.clone()).collect();

    let runner = Runner::new(
        test_config(),
        vec![Directive::Command("PING".to_string()), Directive::Print],
    )
    .parallel(true)
    .workers(2);

    let mut out = Vec::new();
    let summary = runner.run(&hosts, &mut out).unwrap();

    let expected: String = hosts
        .iter()
        .enumerate()
        .map(|(i, addr)| format!("{}: +reply-{}\n", addr, i))
        .collect();
    assert_eq!(summary, RunSummary { completed: 5, aborted: 0 });
    assert_eq!(output_of(out), expected);
    assert!(peak.load(Ordering::SeqCst) <= 2, "peak {}", peak.load(Ordering::SeqCst));

    for (_, server) in servers {
        server.join().unwrap();
    }
}
