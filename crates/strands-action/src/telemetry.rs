//! OTLP exporter settings derived from the environment.
//!
//! Langfuse takes precedence: when its host and both keys are present, the
//! exporter endpoint is `{host}/api/public/otel` with an HTTP Basic header
//! built from `public:secret`. Otherwise a generic OTLP endpoint is honored
//! as-is. Telemetry is best-effort end to end; absence of configuration is
//! not an error and setup failures never abort the run.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::RunnerConfig;

/// Resolved exporter settings handed to the agent's trace attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtlpSettings {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
}

/// Resolve exporter settings from the config. Pure; no I/O.
pub fn resolve(cfg: &RunnerConfig) -> Option<OtlpSettings> {
    if let Some(host) = &cfg.langfuse_base_url
        && let (Some(public_key), Some(secret_key)) =
            (&cfg.langfuse_public_key, &cfg.langfuse_secret_key)
    {
        let token = BASE64.encode(format!("{public_key}:{secret_key}"));
        return Some(OtlpSettings {
            endpoint: format!("{}/api/public/otel", host.trim_end_matches('/')),
            headers: vec![("Authorization".to_string(), format!("Basic {token}"))],
        });
    }

    cfg.otlp_endpoint.as_ref().map(|endpoint| OtlpSettings {
        endpoint: endpoint.clone(),
        headers: cfg
            .otlp_headers
            .as_deref()
            .map(parse_header_list)
            .unwrap_or_default(),
    })
}

/// Apply the resolved settings: log activation and return them for the run.
/// Returns `None` (quietly) when nothing is configured.
pub fn setup_otel(cfg: &RunnerConfig) -> Option<OtlpSettings> {
    let settings = resolve(cfg)?;
    tracing::info!(
        endpoint = %settings.endpoint,
        header_count = settings.headers.len(),
        "OTLP exporter configured"
    );
    Some(settings)
}

/// Parse the OTLP header convention `k=v,k2=v2`; malformed entries are
/// dropped individually.
fn parse_header_list(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use std::collections::HashMap;

    fn cfg_from(pairs: &[(&str, &str)]) -> RunnerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn absent_environment_resolves_to_none() {
        assert_eq!(resolve(&cfg_from(&[])), None);
        assert!(setup_otel(&cfg_from(&[])).is_none());
    }

    #[test]
    fn langfuse_triple_derives_endpoint_and_basic_auth() {
        let cfg = cfg_from(&[
            ("LANGFUSE_BASE_URL", "https://cloud.langfuse.com"),
            ("LANGFUSE_PUBLIC_KEY", "pk-1"),
            ("LANGFUSE_SECRET_KEY", "sk-1"),
        ]);
        let settings = resolve(&cfg).expect("settings");
        assert_eq!(settings.endpoint, "https://cloud.langfuse.com/api/public/otel");
        let (name, value) = &settings.headers[0];
        assert_eq!(name, "Authorization");
        let expected = BASE64.encode("pk-1:sk-1");
        assert_eq!(value, &format!("Basic {expected}"));
    }

    #[test]
    fn langfuse_host_without_keys_falls_through_to_generic() {
        let cfg = cfg_from(&[
            ("LANGFUSE_BASE_URL", "https://cloud.langfuse.com"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "https://otlp.example/v1"),
        ]);
        let settings = resolve(&cfg).expect("settings");
        assert_eq!(settings.endpoint, "https://otlp.example/v1");
        assert!(settings.headers.is_empty());
    }

    #[test]
    fn generic_headers_are_parsed_as_pairs() {
        let cfg = cfg_from(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "https://otlp.example"),
            ("OTEL_EXPORTER_OTLP_HEADERS", "a=1, b=two,malformed,=x"),
        ]);
        let settings = resolve(&cfg).expect("settings");
        assert_eq!(
            settings.headers,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two".to_string()),
            ]
        );
    }

    #[test]
    fn trailing_slash_on_langfuse_host_is_normalized() {
        let cfg = cfg_from(&[
            ("LANGFUSE_BASE_URL", "https://lf.example/"),
            ("LANGFUSE_PUBLIC_KEY", "pk"),
            ("LANGFUSE_SECRET_KEY", "sk"),
        ]);
        let settings = resolve(&cfg).expect("settings");
        assert_eq!(settings.endpoint, "https://lf.example/api/public/otel");
    }
}
