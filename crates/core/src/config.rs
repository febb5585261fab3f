use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

/// Parse a profiled env var, reporting unparseable values instead of
/// silently falling back.
fn profiled_env_parse<T: std::str::FromStr>(
    profile: &str,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match profiled_env_opt(profile, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Settings every command needs. The ticket service and loop settings are
/// parsed separately by [`Config::monitoring`], so a bad `LLM_PROVIDER`
/// never blocks `generate` or `train`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub station: StationConfig,
    pub paths: PathsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CHARGEWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CHARGEWATCH_PROFILE", "");
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        Self {
            station: StationConfig::from_env_profiled(&p),
            paths: PathsConfig::from_env_profiled(&p),
            profile: p,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Parse the ticket service and loop settings under the same profile.
    pub fn monitoring(&self) -> Result<MonitoringSettings, ConfigError> {
        let p = self.profile.as_str();
        Ok(MonitoringSettings {
            llm: LlmConfig::from_env_profiled(p)?,
            ollama: OllamaConfig::from_env_profiled(p),
            monitor: MonitorConfig::from_env_profiled(p)?,
        })
    }

    /// Print the shared settings for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  station:  id={}, location={}", self.station.id, self.station.location);
        tracing::info!(
            "  paths:    corpus={}, model={}",
            self.paths.corpus.display(),
            self.paths.model.display()
        );
    }
}

/// Settings only the `monitor` command reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub monitor: MonitorConfig,
}

impl MonitoringSettings {
    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            "  llm:      provider={}, model={}, timeout={}s, credential={}",
            self.llm.provider,
            self.llm.active_model(&self.ollama),
            self.llm.timeout_secs,
            if self.llm.is_configured() { "set" } else { "missing" }
        );
        tracing::info!(
            "  monitor:  interval={}ms, max_cycles={}, anomaly every {} after {}",
            self.monitor.interval_ms,
            self.monitor
                .max_cycles
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".into()),
            self.monitor.anomaly_every,
            self.monitor.anomaly_warmup_cycles
        );
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "llm": {
                "provider": self.llm.provider,
                "model": self.llm.active_model(&self.ollama),
                "openai_base_url": self.llm.openai_base_url,
                "ollama_url": self.ollama.url,
                "temperature": self.llm.temperature,
                "max_tokens": self.llm.max_tokens,
                "timeout_secs": self.llm.timeout_secs,
                "configured": self.llm.is_configured(),
            },
            "monitor": {
                "interval_ms": self.monitor.interval_ms,
                "max_cycles": self.monitor.max_cycles,
                "anomaly_warmup_cycles": self.monitor.anomaly_warmup_cycles,
                "anomaly_every": self.monitor.anomaly_every,
            },
        })
    }
}

// ── Station ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: String,
    pub location: String,
}

impl StationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            id: profiled_env_or(p, "STATION_ID", "MDS-EV-1138"),
            location: profiled_env_or(p, "STATION_LOCATION", "Shizuoka"),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            id: "MDS-EV-1138".into(),
            location: "Shizuoka".into(),
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Healthy-operation corpus written by `generate`, read by `train`.
    pub corpus: PathBuf,
    /// Model artifact written by `train`, read by `monitor`.
    pub model: PathBuf,
}

impl PathsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            corpus: PathBuf::from(profiled_env_or(p, "CORPUS_PATH", "ev_charger_normal_data.csv")),
            model: PathBuf::from(profiled_env_or(p, "MODEL_PATH", "ev_model.msgpack")),
        }
    }
}

// ── LLM (Gemini / OpenAI / Ollama) ────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Ollama,
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on one ticket request, end to end.
    pub timeout_secs: u64,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "gemini").parse()?,
            gemini_api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            gemini_model: profiled_env_or(p, "GEMINI_MODEL", "gemini-1.5-pro-latest"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            temperature: profiled_env_parse(p, "LLM_TEMPERATURE", 0.2)?,
            max_tokens: profiled_env_parse(p, "LLM_MAX_TOKENS", 2048)?,
            timeout_secs: profiled_env_parse(p, "LLM_TIMEOUT_SECS", 60)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        match self.provider {
            ProviderKind::Gemini => self.gemini_api_key.is_some(),
            ProviderKind::OpenAi => self.openai_api_key.is_some(),
            ProviderKind::Ollama => true,
        }
    }

    /// Fail fast when the active provider has no credential.
    pub fn require_credential(&self) -> Result<(), ConfigError> {
        if self.is_configured() {
            return Ok(());
        }
        let key = match self.provider {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Ollama => return Ok(()),
        };
        Err(ConfigError::MissingCredential(key.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn active_model<'a>(&'a self, ollama: &'a OllamaConfig) -> &'a str {
        match self.provider {
            ProviderKind::Gemini => &self.gemini_model,
            ProviderKind::OpenAi => &self.openai_model,
            ProviderKind::Ollama => &ollama.model,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-pro-latest".into(),
            openai_api_key: None,
            openai_model: "gpt-4o".into(),
            openai_base_url: None,
            temperature: 0.2,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
        }
    }
}

impl OllamaConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
        }
    }
}

// ── Monitoring loop ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Pause between cycles. 0 disables pacing.
    pub interval_ms: u64,
    /// Stop after this many cycles (None = run until interrupted).
    pub max_cycles: Option<u64>,
    /// Simulated faults start after this many cycles...
    pub anomaly_warmup_cycles: u64,
    /// ...and recur on every cycle divisible by this.
    pub anomaly_every: u64,
}

impl MonitorConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        let max_cycles = match profiled_env_opt(p, "MONITOR_MAX_CYCLES") {
            None => None,
            Some(raw) => Some(raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "MONITOR_MAX_CYCLES".into(),
                value: raw,
            })?),
        };
        let anomaly_every = profiled_env_parse(p, "ANOMALY_EVERY", 10)?;
        if anomaly_every == 0 {
            return Err(ConfigError::Invalid {
                key: "ANOMALY_EVERY".into(),
                value: "0".into(),
            });
        }
        Ok(Self {
            interval_ms: profiled_env_parse(p, "MONITOR_INTERVAL_MS", 2000)?,
            max_cycles,
            anomaly_warmup_cycles: profiled_env_parse(p, "ANOMALY_WARMUP_CYCLES", 5)?,
            anomaly_every,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_cycles: None,
            anomaly_warmup_cycles: 5,
            anomaly_every: 10,
        }
    }
}
