//! Gateway configuration — parsed once from the environment at startup.
//!
//! Missing or unparsable optional values fall back to defaults and produce a
//! startup warning; missing upstream base URLs are fatal.

use url::Url;

// ── Defaults ────────────────────────────────────────────────────────────

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_WARMUP_INTERVAL_MS: u64 = 300_000;

/// Transport mode selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// Newline-delimited JSON-RPC over stdin/stdout (subprocess launch).
    Stdio,
    /// HTTP listener with single-shot and streaming MCP endpoints.
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON record per line, stable schema.
    Machine,
    /// Aligned, ANSI-coloured output for humans.
    Human,
}

/// Immutable operational parameters. Built once in `from_env`, shared via
/// `Arc` in [`crate::state::AppState`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Primary REST API base, e.g. `https://api.lanonasis.com`.
    pub api_base_url: Url,
    /// Serverless functions domain base.
    pub functions_base_url: Url,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub warmup_interval_ms: u64,
    /// OAuth authorization server advertised in discovery documents.
    pub auth_base_url: Url,
    /// Protected-resource URL advertised to clients (RFC 9728).
    pub resource_url: String,
    /// Public URL of this gateway, used in server cards.
    pub server_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

impl GatewayConfig {
    /// Parse the environment. Returns the config plus a list of non-fatal
    /// warnings the caller is expected to log.
    pub fn from_env() -> Result<(Self, Vec<String>), ConfigError> {
        let mut warnings = Vec::new();

        let api_base_url = required_url("MEMORY_API_URL")?;
        let functions_base_url = required_url("FUNCTIONS_API_URL")?;

        let mode = match std::env::var("MCP_MODE").as_deref() {
            Ok("stdio") => GatewayMode::Stdio,
            Ok("http") | Err(_) => GatewayMode::Http,
            Ok(other) => {
                warnings.push(format!("MCP_MODE={other} is not recognized, using http"));
                GatewayMode::Http
            }
        };

        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("machine") | Ok("json") => LogFormat::Machine,
            _ => LogFormat::Human,
        };

        let log_level = match std::env::var("LOG_LEVEL").as_deref() {
            Ok(level @ ("error" | "warn" | "info" | "debug")) => level.to_string(),
            Ok(other) => {
                warnings.push(format!("LOG_LEVEL={other} is not recognized, using info"));
                "info".to_string()
            }
            Err(_) => "info".to_string(),
        };

        let api_key = non_empty_env("MEMORY_API_KEY");
        let bearer_token = non_empty_env("MEMORY_AUTH_TOKEN");
        if api_key.is_none() && bearer_token.is_none() {
            warnings.push(
                "no MEMORY_API_KEY or MEMORY_AUTH_TOKEN configured — upstream calls \
                 will be unauthenticated"
                    .to_string(),
            );
        }

        let auth_base_url = match non_empty_env("AUTH_BASE_URL") {
            Some(raw) => Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
                name: "AUTH_BASE_URL",
                source,
            })?,
            None => {
                let mut derived = api_base_url.clone();
                derived.set_path("/");
                warnings.push(format!(
                    "AUTH_BASE_URL not set — advertising {derived} as the authorization server"
                ));
                derived
            }
        };

        let port = parsed_port(&mut warnings);
        let server_url =
            non_empty_env("SERVER_URL").unwrap_or_else(|| format!("http://localhost:{port}"));
        let resource_url =
            non_empty_env("RESOURCE_URL").unwrap_or_else(|| format!("{server_url}/mcp"));

        let config = Self {
            mode,
            port,
            log_level,
            log_format,
            api_base_url,
            functions_base_url,
            api_key,
            bearer_token,
            request_timeout_ms: parsed_u64(
                "REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
                &mut warnings,
            ),
            max_retries: parsed_u64("MAX_RETRIES", u64::from(DEFAULT_MAX_RETRIES), &mut warnings)
                as u32,
            retry_base_delay_ms: parsed_u64(
                "RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY_MS,
                &mut warnings,
            ),
            warmup_interval_ms: parsed_u64(
                "WARMUP_INTERVAL_MS",
                DEFAULT_WARMUP_INTERVAL_MS,
                &mut warnings,
            ),
            auth_base_url,
            resource_url,
            server_url,
        };

        Ok((config, warnings))
    }

    /// Joined URL on the primary API, tolerating missing leading slash.
    pub fn api_url(&self, path: &str) -> String {
        join_base(&self.api_base_url, path)
    }

    /// Joined URL on the functions domain.
    pub fn functions_url(&self, path: &str) -> String {
        join_base(&self.functions_base_url, path)
    }
}

fn join_base(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn required_url(name: &'static str) -> Result<Url, ConfigError> {
    let raw = std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::Missing(name))?;
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parsed_port(warnings: &mut Vec<String>) -> u16 {
    match std::env::var("PORT") {
        Ok(raw) => match raw.parse() {
            Ok(port) => port,
            Err(_) => {
                warnings.push(format!("PORT={raw} is not a valid port, using {DEFAULT_PORT}"));
                DEFAULT_PORT
            }
        },
        Err(_) => DEFAULT_PORT,
    }
}

fn parsed_u64(name: &str, default: u64, warnings: &mut Vec<String>) -> u64 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warnings.push(format!("{name}={raw} is not a number, using {default}"));
                default
            }
        },
        Err(_) => default,
    }
}
