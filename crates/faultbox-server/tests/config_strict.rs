#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::io::Write;

use faultbox_core::error::ClientCode;
use faultbox_core::FaultboxError;
use faultbox_server::config;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k| map.get(k).cloned()
}

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
faults:
  initial_rat: 0.5 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "0.0.0.0:8080");
    assert_eq!(cfg.server.environment, "development");
    assert_eq!(cfg.server.version, "1.0.0");
    assert_eq!(cfg.faults.initial_rate, 0.0);
    assert!(cfg.faults.seed.is_none());
    assert!(cfg.metrics.request_duration);
    assert_eq!(cfg.metrics.duration_buckets.len(), 11);
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
server:
  listen: "127.0.0.1:9000"
  environment: production
  version: "2.3.4"
  service_name: "Checkout Demo"
faults:
  initial_rate: 0.1
  seed: 99
metrics:
  request_duration: false
  duration_buckets: [0.1, 1, 10]
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.server.listen_addr().unwrap().port(), 9000);
    assert_eq!(cfg.server.environment, "production");
    assert_eq!(cfg.server.service_name, "Checkout Demo");
    assert_eq!(cfg.faults.initial_rate, 0.1);
    assert_eq!(cfg.faults.seed, Some(99));
    assert!(!cfg.metrics.request_duration);
    assert_eq!(cfg.metrics.duration_buckets, vec![0.1, 1.0, 10.0]);
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert!(matches!(err, FaultboxError::UnsupportedVersion));
}

#[test]
fn invalid_values_are_rejected() {
    for bad in [
        "version: 1\nfaults: { initial_rate: 1.5 }\n",
        "version: 1\nfaults: { initial_rate: -0.5 }\n",
        "version: 1\nserver: { listen: \"not-an-addr\" }\n",
        "version: 1\nserver: { environment: \"\" }\n",
        "version: 1\nmetrics: { duration_buckets: [] }\n",
        "version: 1\nmetrics: { duration_buckets: [1, 0.5] }\n",
        "version: 1\nmetrics: { duration_buckets: [0, 1] }\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.client_code(), ClientCode::BadRequest, "{bad}");
    }
}

#[test]
fn env_overrides_apply_after_file() {
    let mut cfg = config::load_from_str("version: 1\nserver: { environment: dev }\n").unwrap();
    cfg.apply_env(env(&[
        ("APP_ENV", "production"),
        ("APP_VERSION", "9.9.9"),
        ("PORT", "3000"),
        ("FAULTBOX_SEED", "17"),
    ]))
    .unwrap();

    assert_eq!(cfg.server.environment, "production");
    assert_eq!(cfg.server.version, "9.9.9");
    assert_eq!(cfg.server.listen, "0.0.0.0:3000");
    assert_eq!(cfg.faults.seed, Some(17));
}

#[test]
fn node_env_is_a_fallback_for_app_env() {
    let mut cfg = config::ServerConfig::default();
    cfg.apply_env(env(&[("NODE_ENV", "production")])).unwrap();
    assert_eq!(cfg.server.environment, "production");

    let mut cfg = config::ServerConfig::default();
    cfg.apply_env(env(&[("NODE_ENV", "production"), ("APP_ENV", "staging")]))
        .unwrap();
    assert_eq!(cfg.server.environment, "staging");

    let mut cfg = config::ServerConfig::default();
    cfg.apply_env(env(&[("NODE_ENV", "production"), ("APP_ENV", "")]))
        .unwrap();
    assert_eq!(cfg.server.environment, "production");
}

#[test]
fn empty_env_values_are_ignored() {
    let mut cfg = config::ServerConfig::default();
    cfg.apply_env(env(&[("APP_ENV", ""), ("PORT", "")])).unwrap();
    assert_eq!(cfg.server.environment, "development");
    assert_eq!(cfg.server.listen, "0.0.0.0:8080");
}

#[test]
fn bad_port_is_rejected() {
    let mut cfg = config::ServerConfig::default();
    let err = cfg.apply_env(env(&[("PORT", "eighty")])).expect_err("must fail");
    assert_eq!(err.client_code(), ClientCode::BadRequest);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let cfg = config::load(env(&[
        ("FAULTBOX_CONFIG", path.to_str().unwrap()),
        ("PORT", "8181"),
    ]))
    .unwrap();
    assert_eq!(cfg.server.listen, "0.0.0.0:8181");
    assert_eq!(cfg.server.environment, "development");
}

#[test]
fn file_then_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "version: 1\nserver:\n  environment: qa\nfaults:\n  initial_rate: 0.3").unwrap();

    let cfg = config::load(env(&[
        ("FAULTBOX_CONFIG", file.path().to_str().unwrap()),
        ("APP_VERSION", "1.2.3"),
    ]))
    .unwrap();
    assert_eq!(cfg.server.environment, "qa");
    assert_eq!(cfg.server.version, "1.2.3");
    assert_eq!(cfg.faults.initial_rate, 0.3);
}

#[test]
fn invalid_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "version: 1\nbogus: true").unwrap();
    let err = config::load(env(&[("FAULTBOX_CONFIG", file.path().to_str().unwrap())]))
        .expect_err("must fail");
    assert_eq!(err.client_code(), ClientCode::BadRequest);
}
