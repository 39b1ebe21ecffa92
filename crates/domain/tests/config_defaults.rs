use agora_domain::config::{Config, ConfigSeverity};
use agora_domain::RoomMode;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 4800);
}

#[test]
fn defaults_match_documented_limits() {
    let config = Config::default();
    assert_eq!(config.federation.seen_id_limit, 10_000);
    assert_eq!(config.limits.send_buffer_limit, 256);
    assert_eq!(config.rooms.default_mode, RoomMode::Deep);
    assert!(config.federation.bus_url.is_none());
    assert!(!config.rooms.reap_on_empty);
}

#[test]
fn explicit_sections_parse() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 4900

[federation]
server_id = "node-a"
bus_url = "127.0.0.1:5900"

[rooms]
default_mode = "quick"
default_topic = "general"

[[tools]]
name = "web_search"
tier = "expert"
rate_limit = { per_hour = 10, max_concurrent = 2 }
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.federation.server_id.as_deref(), Some("node-a"));
    assert_eq!(config.rooms.default_mode, RoomMode::Quick);
    assert_eq!(config.rooms.default_topic.as_deref(), Some("general"));
    assert_eq!(config.tools.len(), 1);
    assert_eq!(config.tools[0].rate_limit.unwrap().per_hour, Some(10));
    assert!(config.validate().is_empty());
}

#[test]
fn zero_port_is_an_error() {
    let config: Config = toml::from_str("[server]\nport = 0\n").unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.field == "server.port"));
}

#[test]
fn duplicate_tool_names_warn() {
    let toml_str = r#"
[[tools]]
name = "summarize"

[[tools]]
name = "summarize"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Warning && i.field == "tools[1].name"));
}
