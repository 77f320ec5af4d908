use std::io::Write;
use std::time::Duration;

use warden::config::{Config, PoolConfig, ServerConfig};

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.server.listen_addr(), "127.0.0.1:8080");
    assert_eq!(cfg.server.backlog, 50);
    assert_eq!(cfg.server.idle_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.server.buffer_size, 8192);
    assert_eq!(cfg.pool.threads, 0);
    assert_eq!(cfg.pool.max_load, 5000);
}

#[test]
fn test_config_partial_yaml_keeps_defaults() {
    let cfg = Config::from_yaml(
        r#"
server:
  port: 9000
  idle_timeout_ms: 1500
pool:
  max_load: 16
"#,
    )
    .unwrap();

    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.idle_timeout(), Duration::from_millis(1500));
    assert_eq!(cfg.pool.max_load, 16);
    assert_eq!(cfg.pool.threads, PoolConfig::default().threads);
}

#[test]
fn test_config_empty_yaml_is_default() {
    assert_eq!(Config::from_yaml("").unwrap(), Config::default());
}

#[test]
fn test_config_invalid_yaml() {
    assert!(Config::from_yaml("server: [1, 2").is_err());
    assert!(Config::from_yaml("server:\n  port: not-a-port\n").is_err());
}

#[test]
fn test_config_limits() {
    let server = ServerConfig {
        max_header_bytes: 100,
        max_body_bytes: 200,
        ..ServerConfig::default()
    };
    let limits = server.limits();

    assert_eq!(limits.max_header_bytes, 100);
    assert_eq!(limits.max_body_bytes, 200);
}

#[test]
fn test_config_apply_listen() {
    let mut cfg = Config::default();
    cfg.apply_listen("0.0.0.0:3000").unwrap();
    assert_eq!(cfg.server.listen_addr(), "0.0.0.0:3000");

    assert!(cfg.apply_listen("no-port").is_err());
    assert!(cfg.apply_listen("host:99999").is_err());
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  host: 0.0.0.0\n  backlog: 128").unwrap();

    let cfg = Config::from_file(file.path()).unwrap();
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.backlog, 128);

    assert!(Config::from_file("/nonexistent/warden.yaml").is_err());
}

// The only test touching the process environment.
#[test]
fn test_config_load_from_environment() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  port: 7000\npool:\n  threads: 3").unwrap();

    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("WARDEN_CONFIG");
    }
    assert_eq!(Config::load().unwrap(), Config::default());

    unsafe {
        std::env::set_var("WARDEN_CONFIG", file.path());
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.port, 7000);
    assert_eq!(cfg.pool.threads, 3);

    unsafe {
        std::env::set_var("LISTEN", "127.0.0.1:8000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr(), "127.0.0.1:8000");
    assert_eq!(cfg.pool.threads, 3);

    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("WARDEN_CONFIG");
    }
}
