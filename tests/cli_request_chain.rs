use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "hybsim-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn run_chain(dir: &PathBuf, protocol: &str) -> Vec<Value> {
    let out_json = dir.join(format!("trace-{protocol}.json"));
    let output = Command::new(env!("CARGO_BIN_EXE_request_chain"))
        .args([
            "--protocol",
            protocol,
            "--trace-json",
            out_json.to_str().unwrap(),
            "--until-ms",
            "30000",
        ])
        .output()
        .expect("run request_chain");
    assert!(
        output.status.success(),
        "request_chain failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("chain_completed=true"),
        "chain did not complete: {stdout}"
    );

    let raw = fs::read_to_string(&out_json).expect("read trace json");
    let v: Value = serde_json::from_str(&raw).expect("parse trace json");
    v.as_array().expect("trace must be a JSON array").clone()
}

fn count_kind(events: &[Value], kind: &str) -> usize {
    events
        .iter()
        .filter(|e| e.get("kind").and_then(|k| k.as_str()) == Some(kind))
        .count()
}

#[test]
fn udp_chain_completes_and_resolves_dns() {
    let dir = unique_temp_dir("udp");
    let events = run_chain(&dir, "udp");

    assert_eq!(count_kind(&events, "chain_completed"), 1);
    assert_eq!(count_kind(&events, "dns_resolved"), 1);
    let resolved = events
        .iter()
        .find(|e| e.get("kind").and_then(|k| k.as_str()) == Some("dns_resolved"))
        .expect("dns_resolved event");
    assert_eq!(resolved.get("answer").and_then(|a| a.as_u64()), Some(3));

    // UDP 场景：HTTP 与数据库两次握手
    assert_eq!(count_kind(&events, "syn_sent"), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tcp_chain_observes_three_syns_and_three_syn_acks() {
    let dir = unique_temp_dir("tcp");
    let events = run_chain(&dir, "tcp");

    assert_eq!(count_kind(&events, "syn_sent"), 3);
    assert_eq!(count_kind(&events, "syn_ack_sent"), 3);
    assert_eq!(count_kind(&events, "chain_completed"), 1);

    // 事件时间戳单调不减
    let mut prev = 0u64;
    for e in &events {
        let t = e.get("t_ns").and_then(|t| t.as_u64()).expect("t_ns");
        assert!(t >= prev, "timestamps must be non-decreasing");
        prev = t;
    }

    let _ = fs::remove_dir_all(&dir);
}
