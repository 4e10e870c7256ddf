//! Transport Resolver: turns raw key/value settings into a `ToolServerConfig`.
//!
//! No I/O beyond URL validation, probing a launcher script, and (process
//! targets only) creating the shared output directory.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::gateway::{GatewayError, OutputDir};

pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Static description of one remote service (converter, renderer).
#[derive(Debug)]
pub struct ServiceProfile {
    /// Short name used in logs and error messages.
    pub name: &'static str,
    /// Prefix of the environment keys, e.g. `MARKITDOWN` -> `MARKITDOWN_MCP_URL`.
    pub env_prefix: &'static str,
    pub default_url: &'static str,
    /// Preferred local launcher, used when it exists on disk.
    pub launcher: Option<Launcher>,
    /// Run-once package launcher used when the script is absent.
    pub fallback_command: &'static str,
    pub fallback_args: &'static [&'static str],
    /// Env var through which a spawned server learns the output directory.
    pub output_dir_env: Option<&'static str>,
}

#[derive(Debug)]
pub struct Launcher {
    pub interpreter: &'static str,
    pub script: &'static str,
}

/// Raw, unparsed settings for one tool server. Values are kept verbatim so the
/// degrade-gracefully rules apply at resolution time.
#[derive(Debug, Clone, Default)]
pub struct ToolServerSettings {
    pub url: Option<String>,
    pub transport: Option<String>,
    pub timeout: Option<String>,
    pub headers: Option<String>,
    pub command: Option<String>,
    pub args: Option<String>,
    pub env: Option<String>,
}

impl ToolServerSettings {
    /// Reads `<PREFIX>_MCP_*` keys through `lookup`. Blank values count as unset.
    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |suffix: &str| {
            lookup(&format!("{prefix}_MCP_{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            url: read("URL"),
            transport: read("TRANSPORT"),
            timeout: read("TIMEOUT"),
            headers: read("HEADERS"),
            command: read("COMMAND"),
            args: read("ARGS"),
            env: read("ENV"),
        }
    }

    fn wants_process(&self) -> bool {
        let stdio = self
            .transport
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("stdio"));
        stdio || self.command.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolServerConfig {
    Network(NetworkTarget),
    Process(ProcessTarget),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkTarget {
    pub endpoint: Url,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessTarget {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl ToolServerConfig {
    pub fn timeout(&self) -> Duration {
        match self {
            ToolServerConfig::Network(t) => t.timeout,
            ToolServerConfig::Process(t) => t.timeout,
        }
    }
}

pub async fn resolve(
    profile: &ServiceProfile,
    settings: &ToolServerSettings,
    output_dir: Option<&OutputDir>,
) -> Result<ToolServerConfig, GatewayError> {
    let timeout = parse_timeout(settings.timeout.as_deref());

    if settings.wants_process() {
        return resolve_process(profile, settings, output_dir, timeout)
            .await
            .map(ToolServerConfig::Process);
    }

    let raw_url = settings.url.as_deref().unwrap_or(profile.default_url);
    let endpoint = Url::parse(raw_url).map_err(|e| {
        GatewayError::Configuration(format!(
            "Invalid {}_MCP_URL value '{raw_url}': {e}. Provide a fully qualified URL (e.g. {}).",
            profile.env_prefix, profile.default_url
        ))
    })?;
    let headers = settings
        .headers
        .as_deref()
        .map(|raw| parse_string_map(raw, profile, "HEADERS"))
        .unwrap_or_default();

    Ok(ToolServerConfig::Network(NetworkTarget {
        endpoint,
        timeout,
        headers,
    }))
}

async fn resolve_process(
    profile: &ServiceProfile,
    settings: &ToolServerSettings,
    output_dir: Option<&OutputDir>,
    timeout: Duration,
) -> Result<ProcessTarget, GatewayError> {
    let extra_args = settings
        .args
        .as_deref()
        .map(|raw| parse_args(raw, profile))
        .unwrap_or_default();

    let (command, mut args) = match settings.command.as_deref() {
        Some(command) => (command.to_string(), Vec::new()),
        None => default_launch(profile).await,
    };
    args.extend(extra_args);

    let mut env = settings
        .env
        .as_deref()
        .map(|raw| parse_string_map(raw, profile, "ENV"))
        .unwrap_or_default();

    if let (Some(key), Some(dir)) = (profile.output_dir_env, output_dir) {
        let path = dir.ensure().await?;
        env.insert(key.to_string(), path.to_string_lossy().into_owned());
    }

    Ok(ProcessTarget {
        command,
        args,
        env,
        timeout,
    })
}

async fn default_launch(profile: &ServiceProfile) -> (String, Vec<String>) {
    if let Some(launcher) = &profile.launcher {
        let present = tokio::fs::try_exists(Path::new(launcher.script))
            .await
            .unwrap_or(false);
        if present {
            return (
                launcher.interpreter.to_string(),
                vec![launcher.script.to_string()],
            );
        }
        debug!(
            "{} launcher '{}' not found; using '{}'",
            profile.name, launcher.script, profile.fallback_command
        );
    }

    (
        profile.fallback_command.to_string(),
        profile.fallback_args.iter().map(|a| a.to_string()).collect(),
    )
}

/// Milliseconds; anything unparseable or non-positive falls back to the default.
fn parse_timeout(raw: Option<&str>) -> Duration {
    let millis = raw
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    Duration::from_millis(millis)
}

/// Flat JSON object of string pairs. Non-string scalars are stringified;
/// malformed input is logged and ignored.
fn parse_string_map(raw: &str, profile: &ServiceProfile, key: &str) -> BTreeMap<String, String> {
    match serde_json::from_str::<BTreeMap<String, Value>>(raw) {
        Ok(map) => map
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect(),
        Err(e) => {
            warn!(
                "[{}] Failed to parse {}_MCP_{key} as a JSON object of key/value pairs; ignoring it: {e}",
                profile.name, profile.env_prefix
            );
            BTreeMap::new()
        }
    }
}

/// JSON array of strings, or a whitespace separated list.
fn parse_args(raw: &str, profile: &ServiceProfile) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<String>>(trimmed) {
            Ok(args) => return args,
            Err(e) => warn!(
                "[{}] {}_MCP_ARGS is not a JSON array of strings ({e}); splitting on whitespace",
                profile.name, profile.env_prefix
            ),
        }
    }
    trimmed.split_whitespace().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    static PROFILE: ServiceProfile = ServiceProfile {
        name: "test",
        env_prefix: "TEST",
        default_url: "http://127.0.0.1:3999/mcp",
        launcher: Some(Launcher {
            interpreter: "node",
            script: "scripts/definitely-not-here.mjs",
        }),
        fallback_command: "npx",
        fallback_args: &["-y", "some-mcp"],
        output_dir_env: Some("TEST_OUTPUT_DIR"),
    };

    fn settings(pairs: &[(&str, &str)]) -> ToolServerSettings {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ToolServerSettings::from_lookup("TEST", |k| map.get(k).cloned())
    }

    #[tokio::test]
    async fn test_defaults_to_network_target() {
        let config = resolve(&PROFILE, &settings(&[]), None).await.unwrap();
        match config {
            ToolServerConfig::Network(target) => {
                assert_eq!(target.endpoint.as_str(), "http://127.0.0.1:3999/mcp");
                assert_eq!(target.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
                assert!(target.headers.is_empty());
            }
            other => panic!("expected network target, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_url_names_the_value() {
        let err = resolve(&PROFILE, &settings(&[("TEST_MCP_URL", "not a url")]), None)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("not a url"));
    }

    #[tokio::test]
    async fn test_headers_parsed_and_bad_json_ignored() {
        let good = settings(&[("TEST_MCP_HEADERS", r#"{"Authorization":"Bearer x","X-Retry":3}"#)]);
        let ToolServerConfig::Network(target) = resolve(&PROFILE, &good, None).await.unwrap() else {
            panic!("expected network target");
        };
        assert_eq!(target.headers["Authorization"], "Bearer x");
        assert_eq!(target.headers["X-Retry"], "3");

        let bad = settings(&[("TEST_MCP_HEADERS", "{not json")]);
        let ToolServerConfig::Network(target) = resolve(&PROFILE, &bad, None).await.unwrap() else {
            panic!("expected network target");
        };
        assert!(target.headers.is_empty());
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(parse_timeout(Some("5000")), Duration::from_millis(5000));
        assert_eq!(parse_timeout(Some("0")), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(parse_timeout(Some("-3")), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(parse_timeout(Some("soon")), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(parse_timeout(None), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[tokio::test]
    async fn test_stdio_falls_back_when_launcher_missing() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDir::new(dir.path().join("scratch"));
        let s = settings(&[
            ("TEST_MCP_TRANSPORT", "stdio"),
            ("TEST_MCP_ENV", r#"{"LOG_LEVEL":"debug"}"#),
        ]);

        let ToolServerConfig::Process(target) = resolve(&PROFILE, &s, Some(&output)).await.unwrap()
        else {
            panic!("expected process target");
        };
        assert_eq!(target.command, "npx");
        assert_eq!(target.args, vec!["-y", "some-mcp"]);
        assert_eq!(target.env["LOG_LEVEL"], "debug");
        let scratch = std::fs::canonicalize(dir.path().join("scratch")).unwrap();
        assert_eq!(target.env["TEST_OUTPUT_DIR"], scratch.to_string_lossy());
    }

    #[tokio::test]
    async fn test_explicit_command_with_args() {
        let s = settings(&[
            ("TEST_MCP_COMMAND", "/usr/local/bin/server"),
            ("TEST_MCP_ARGS", r#"["--port", "0"]"#),
            ("TEST_MCP_ENV", "[broken"),
        ]);
        let ToolServerConfig::Process(target) = resolve(&PROFILE, &s, None).await.unwrap() else {
            panic!("expected process target");
        };
        assert_eq!(target.command, "/usr/local/bin/server");
        assert_eq!(target.args, vec!["--port", "0"]);
        assert!(target.env.is_empty());
    }

    #[tokio::test]
    async fn test_command_selects_process_even_with_url() {
        let s = settings(&[
            ("TEST_MCP_URL", "http://127.0.0.1:4000/mcp"),
            ("TEST_MCP_COMMAND", "markitdown-mcp"),
        ]);
        let ToolServerConfig::Process(target) = resolve(&PROFILE, &s, None).await.unwrap() else {
            panic!("expected process target");
        };
        assert_eq!(target.command, "markitdown-mcp");
        assert!(target.args.is_empty());
    }

    #[test]
    fn test_args_whitespace_and_malformed_json() {
        assert_eq!(parse_args("--a  b", &PROFILE), vec!["--a", "b"]);
        assert_eq!(parse_args("[--a", &PROFILE), vec!["[--a"]);
    }
}
