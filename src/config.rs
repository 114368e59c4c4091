// src/config.rs
use std::{env, net::IpAddr, path::PathBuf};
use tracing::warn;
use url::Url;

pub const DEFAULT_FILMS_URL: &str = "https://en.wikipedia.org/wiki/List_of_highest-grossing_films";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Credentials and endpoint for the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub films_url: Url,
    pub user_agent: String,
    /// `None` disables the generic LLM path.
    pub openai: Option<OpenAiConfig>,
    pub plot_font: Option<PathBuf>,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parsed(&get, "PORT", 5000);
        let bind_addr = parsed(&get, "BIND_ADDR", IpAddr::from([0, 0, 0, 0]));
        let films_url = parsed(&get, "FILMS_URL", default_films_url());

        let openai = get("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
        });

        Self {
            bind_addr,
            port,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            films_url,
            user_agent: get("USER_AGENT")
                .unwrap_or_else(|| format!("tablescout/{}", env!("CARGO_PKG_VERSION"))),
            openai,
            plot_font: get("PLOT_FONT_PATH").map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_films_url() -> Url {
    Url::parse(DEFAULT_FILMS_URL).expect("default films URL should parse")
}

fn parsed<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}
