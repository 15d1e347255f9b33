//! Info Decoder Tests
//!
//! Tests for parsing info reports and merging them into a result store.

use kvprobe::info::{decode_info, is_info_command};
use kvprobe::{HostAddr, ResultStore};

const INFO_REPORT: &str = "# Server\r\n\
redis_version:7.2.4\r\n\
uptime_in_seconds:120\r\n\
\r\n\
# Replication\r\n\
role:master\r\n\
connected_slaves:0\r\n";

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_basic_report() {
    let fields = decode_info("# Server\r\nrole:master\r\nuptime_in_seconds:120\r\n");

    assert_eq!(fields.len(), 2);
    assert_eq!(fields["role"], "master");
    assert_eq!(fields["uptime_in_seconds"], "120");
}

#[test]
fn test_decode_skips_blank_and_comment_lines() {
    let fields = decode_info(INFO_REPORT);

    assert_eq!(fields.len(), 4);
    assert!(fields.keys().all(|k| !k.starts_with('#')));
    assert_eq!(fields["redis_version"], "7.2.4");
    assert_eq!(fields["connected_slaves"], "0");
}

#[test]
fn test_value_keeps_text_after_first_colon() {
    let fields = decode_info("executable:/usr/bin/redis-server\r\nslave0:ip=10.0.0.2,port=6380\r\nconfig: spaced \r\n");

    assert_eq!(fields["executable"], "/usr/bin/redis-server");
    assert_eq!(fields["slave0"], "ip=10.0.0.2,port=6380");
    assert_eq!(fields["config"], " spaced ");
}

#[test]
fn test_value_with_multiple_colons() {
    let fields = decode_info("listener0:name=tcp,bind=::1,port=6379\r\n");
    assert_eq!(fields["listener0"], "name=tcp,bind=::1,port=6379");
}

#[test]
fn test_lines_without_colon_are_skipped() {
    let fields = decode_info("garbage\r\nrole:slave\r\n");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields["role"], "slave");
}

#[test]
fn test_bare_newlines_are_accepted() {
    let fields = decode_info("# Server\nrole:master\nuptime_in_seconds:5\n");
    assert_eq!(fields["uptime_in_seconds"], "5");
}

#[test]
fn test_decode_empty_payload() {
    assert!(decode_info("").is_empty());
}

// =============================================================================
// Store Merge Tests
// =============================================================================

#[test]
fn test_redefined_key_overwrites_store_entry() {
    let mut store = ResultStore::for_host(&HostAddr::new("localhost", 6379));

    store.extend(decode_info("# Server\r\nrole:master\r\nuptime_in_seconds:120\r\n"));
    assert_eq!(store.get("role"), Some("master"));

    store.extend(decode_info("role:slave\r\n"));
    assert_eq!(store.get("role"), Some("slave"));
    assert_eq!(store.get("uptime_in_seconds"), Some("120"));
}

#[test]
fn test_store_is_seeded_with_identity_fields() {
    let store = ResultStore::for_host(&HostAddr::new("cache-01.internal", 6380));

    assert_eq!(store.get("host"), Some("cache-01.internal"));
    assert_eq!(store.get("port"), Some("6380"));
    assert_eq!(store.get("hostport"), Some("cache-01.internal:6380"));
    assert_eq!(store.get("response"), Some(""));
    assert_eq!(store.len(), 4);
}

#[test]
fn test_info_fields_can_shadow_identity_fields() {
    let mut store = ResultStore::for_host(&HostAddr::new("localhost", 6379));
    store.extend(decode_info("port:7000\r\n"));
    assert_eq!(store.get("port"), Some("7000"));
}

// =============================================================================
// Trigger Tests
// =============================================================================

#[test]
fn test_info_trigger_is_literal() {
    assert!(is_info_command("info"));
    assert!(!is_info_command("INFO"));
    assert!(!is_info_command("info "));
    assert!(!is_info_command("info server"));
}
