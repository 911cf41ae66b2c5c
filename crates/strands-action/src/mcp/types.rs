//! MCP server descriptors parsed from the `MCP_SERVERS` JSON document.
//!
//! The document shape is `{"mcpServers": {"<name>": {...}}}`. Each entry
//! carries either a `command` (spawn a local process over stdio) or a `url`
//! (remote transport); transport selection happens at parse time so the rest
//! of the runner works with a tagged variant instead of loose JSON.

use serde_json::Value;
use tracing::warn;

/// Transport for one MCP server, decided at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpTransport {
    /// Spawn `command args..` and speak MCP over its stdio.
    Stdio {
        command: String,
        args: Vec<String>,
        env: Vec<(String, String)>,
    },
    /// Remote server using Server-Sent Events.
    Sse {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Remote server using streamable HTTP.
    StreamableHttp {
        url: String,
        headers: Vec<(String, String)>,
    },
}

/// One enabled MCP server from the descriptor document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerDef {
    pub name: String,
    /// Prefix applied to the server's tool names, defaults to the server name.
    pub prefix: String,
    pub transport: McpTransport,
    /// Tool names to hide from the agent after discovery.
    pub disabled_tools: Vec<String>,
}

/// Parse the `MCP_SERVERS` document. A malformed top-level document degrades
/// to no servers; malformed or disabled entries are skipped individually.
pub fn parse_mcp_servers(raw: &str) -> Vec<McpServerDef> {
    let doc: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(error) => {
            warn!(%error, "failed to parse MCP_SERVERS JSON; continuing without MCP servers");
            return Vec::new();
        }
    };
    let Some(servers) = doc.get("mcpServers").and_then(Value::as_object) else {
        warn!("MCP_SERVERS has no mcpServers object; continuing without MCP servers");
        return Vec::new();
    };

    let mut defs = Vec::new();
    for (name, cfg) in servers {
        if cfg.get("disabled").and_then(Value::as_bool).unwrap_or(false) {
            warn!(server = %name, "skipping disabled MCP server");
            continue;
        }
        match parse_server(name, cfg) {
            Some(def) => defs.push(def),
            None => warn!(server = %name, "skipping MCP server with no command or url"),
        }
    }
    defs
}

fn parse_server(name: &str, cfg: &Value) -> Option<McpServerDef> {
    let transport = if let Some(command) = cfg.get("command").and_then(Value::as_str) {
        McpTransport::Stdio {
            command: command.to_string(),
            args: string_list(cfg.get("args")),
            env: string_map(cfg.get("env")),
        }
    } else if let Some(url) = cfg.get("url").and_then(Value::as_str) {
        let headers = string_map(cfg.get("headers"));
        if url.contains("/sse") {
            McpTransport::Sse {
                url: url.to_string(),
                headers,
            }
        } else {
            McpTransport::StreamableHttp {
                url: url.to_string(),
                headers,
            }
        }
    } else {
        return None;
    };

    Some(McpServerDef {
        name: name.to_string(),
        prefix: cfg
            .get("prefix")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string(),
        transport,
        disabled_tools: string_list(cfg.get("disabledTools")),
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn string_map(value: Option<&Value>) -> Vec<(String, String)> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_document_degrades_to_no_servers() {
        assert!(parse_mcp_servers("not json").is_empty());
        assert!(parse_mcp_servers("{}").is_empty());
        assert!(parse_mcp_servers("{\"mcpServers\": 3}").is_empty());
    }

    #[test]
    fn disabled_server_never_produces_a_definition() {
        let raw = r#"{"mcpServers": {
            "off": {"command": "srv", "disabled": true},
            "on": {"command": "srv"}
        }}"#;
        let defs = parse_mcp_servers(raw);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "on");
    }

    #[test]
    fn command_selects_stdio_transport() {
        let raw = r#"{"mcpServers": {"local": {
            "command": "uvx",
            "args": ["server", "--flag"],
            "env": {"TOKEN": "t"}
        }}}"#;
        let defs = parse_mcp_servers(raw);
        assert_eq!(
            defs[0].transport,
            McpTransport::Stdio {
                command: "uvx".into(),
                args: vec!["server".into(), "--flag".into()],
                env: vec![("TOKEN".into(), "t".into())],
            }
        );
    }

    #[test]
    fn sse_path_segment_selects_sse_transport() {
        let raw = r#"{"mcpServers": {
            "a": {"url": "https://host/sse"},
            "b": {"url": "https://host/mcp"}
        }}"#;
        let defs = parse_mcp_servers(raw);
        let by_name = |n: &str| defs.iter().find(|d| d.name == n).unwrap();
        assert!(matches!(by_name("a").transport, McpTransport::Sse { .. }));
        assert!(matches!(
            by_name("b").transport,
            McpTransport::StreamableHttp { .. }
        ));
    }

    #[test]
    fn prefix_defaults_to_server_name() {
        let raw = r#"{"mcpServers": {
            "github": {"url": "https://host/mcp"},
            "aliased": {"url": "https://host/mcp", "prefix": "gh"}
        }}"#;
        let defs = parse_mcp_servers(raw);
        let by_name = |n: &str| defs.iter().find(|d| d.name == n).unwrap();
        assert_eq!(by_name("github").prefix, "github");
        assert_eq!(by_name("aliased").prefix, "gh");
    }

    #[test]
    fn entries_without_command_or_url_are_skipped() {
        let raw = r#"{"mcpServers": {
            "bad": {"prefix": "x"},
            "good": {"command": "srv"}
        }}"#;
        let defs = parse_mcp_servers(raw);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "good");
    }

    #[test]
    fn disabled_tools_are_carried_on_the_definition() {
        let raw = r#"{"mcpServers": {"s": {
            "command": "srv",
            "disabledTools": ["noisy", "slow"]
        }}}"#;
        let defs = parse_mcp_servers(raw);
        assert_eq!(defs[0].disabled_tools, vec!["noisy", "slow"]);
    }

    #[test]
    fn remote_headers_are_parsed() {
        let raw = r#"{"mcpServers": {"r": {
            "url": "https://host/mcp",
            "headers": {"Authorization": "Bearer t"}
        }}}"#;
        let defs = parse_mcp_servers(raw);
        match &defs[0].transport {
            McpTransport::StreamableHttp { headers, .. } => {
                assert_eq!(headers, &[("Authorization".to_string(), "Bearer t".to_string())]);
            }
            other => panic!("unexpected transport: {other:?}"),
        }
    }
}
