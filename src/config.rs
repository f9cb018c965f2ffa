//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `QUILLPAD_WORK_DIR` and `QUILLPAD_LOG_LEVEL` env overrides.
//!
//! API keys are never sourced from TOML: `LLM_API_KEY` and
//! `NOVELAI_API_KEY` come from the environment (a `.env` file is loaded
//! by `main` before config is read).

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Completion endpoint configuration (`[llm]` in the TOML).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (e.g. `"dummy"`, `"openai-compatible"`).
    pub provider: String,
    /// Base URL; `/models` and `/completions` are appended to it.
    pub api_base_url: String,
    /// Model used when the user has not picked one from the list.
    pub default_model: String,
    /// Per-request HTTP timeout in seconds. Streams can run long.
    pub timeout_seconds: u64,
    /// End-of-turn sentinels: a chunk containing one terminates the stream.
    pub stop_sequences: Vec<String>,
}

/// Grammar-check endpoint configuration (`[grammar]`).
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    pub api_url: String,
    pub language: String,
}

/// Text-to-speech configuration (`[tts]`).
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Master switch — when false the voice module is never constructed.
    pub enabled: bool,
    /// Which provider is active (`"novelai"` or `"openai-speech"`).
    pub provider: String,
    /// Endpoint base for the speech provider; ignored by NovelAI.
    pub api_base_url: String,
    /// Voice / speaker name passed to the provider.
    pub voice: String,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for session, presets and rendered output
    /// (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub llm: LlmConfig,
    pub grammar: GrammarConfig,
    pub tts: TtsConfig,
    /// From `LLM_API_KEY` env — `None` for keyless local endpoints.
    pub llm_api_key: Option<String>,
    /// From `NOVELAI_API_KEY` env — required only by the NovelAI voice provider.
    pub novelai_api_key: Option<String>,
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    notebook: RawNotebook,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    grammar: RawGrammar,
    #[serde(default)]
    tts: RawTts,
}

#[derive(Deserialize)]
struct RawNotebook {
    #[serde(default = "default_work_dir")]
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawNotebook {
    fn default() -> Self {
        Self { work_dir: default_work_dir(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(default = "default_llm_provider")]
    provider: String,
    #[serde(default = "default_llm_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_llm_model")]
    default_model: String,
    #[serde(default = "default_llm_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_stop_sequences")]
    stop_sequences: Vec<String>,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_base_url: default_llm_api_base_url(),
            default_model: default_llm_model(),
            timeout_seconds: default_llm_timeout_seconds(),
            stop_sequences: default_stop_sequences(),
        }
    }
}

#[derive(Deserialize)]
struct RawGrammar {
    #[serde(default = "default_grammar_api_url")]
    api_url: String,
    #[serde(default = "default_grammar_language")]
    language: String,
}

impl Default for RawGrammar {
    fn default() -> Self {
        Self { api_url: default_grammar_api_url(), language: default_grammar_language() }
    }
}

#[derive(Deserialize)]
struct RawTts {
    #[serde(default = "default_false")]
    enabled: bool,
    #[serde(default = "default_tts_provider")]
    provider: String,
    #[serde(default = "default_tts_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_tts_voice")]
    voice: String,
}

impl Default for RawTts {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_tts_provider(),
            api_base_url: default_tts_api_base_url(),
            voice: default_tts_voice(),
        }
    }
}

fn default_work_dir() -> String { "~/.quillpad".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_llm_provider() -> String { "openai-compatible".to_string() }
fn default_llm_api_base_url() -> String { "https://api.totalgpt.ai".to_string() }
fn default_llm_model() -> String { "L3-70B-Euryale-v2.1".to_string() }
fn default_llm_timeout_seconds() -> u64 { 300 }
fn default_stop_sequences() -> Vec<String> {
    vec!["<|eot_id|>".to_string(), "<|im_end|>".to_string()]
}
fn default_grammar_api_url() -> String { "https://api.languagetool.org/v2/check".to_string() }
fn default_grammar_language() -> String { "en-US".to_string() }
fn default_tts_provider() -> String { "novelai".to_string() }
fn default_tts_api_base_url() -> String { "https://api.novelai.net".to_string() }
fn default_tts_voice() -> String { "Crina".to_string() }

fn default_false() -> bool { false }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `config/default.toml`, then apply env-var overrides.
/// A missing file yields the built-in defaults rather than an error.
pub fn load() -> Result<Config, AppError> {
    let work_dir_override = env::var("QUILLPAD_WORK_DIR").ok();
    let log_level_override = env::var("QUILLPAD_LOG_LEVEL").ok();
    load_from(
        Path::new("config/default.toml"),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let parsed: RawConfig = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RawConfig::default(),
        Err(e) => {
            return Err(AppError::Config(format!("cannot read {}: {e}", path.display())));
        }
    };

    let work_dir_str = work_dir_override.unwrap_or(&parsed.notebook.work_dir).to_string();
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override.unwrap_or(&parsed.notebook.log_level).to_string();

    Ok(Config {
        work_dir,
        log_level,
        llm: LlmConfig {
            provider: parsed.llm.provider,
            api_base_url: parsed.llm.api_base_url,
            default_model: parsed.llm.default_model,
            timeout_seconds: parsed.llm.timeout_seconds,
            stop_sequences: parsed.llm.stop_sequences,
        },
        grammar: GrammarConfig {
            api_url: parsed.grammar.api_url,
            language: parsed.grammar.language,
        },
        tts: TtsConfig {
            enabled: parsed.tts.enabled,
            provider: parsed.tts.provider,
            api_base_url: parsed.tts.api_base_url,
            voice: parsed.tts.voice,
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        novelai_api_key: env::var("NOVELAI_API_KEY").ok(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — dummy provider, no API keys, no external calls.
#[cfg(test)]
impl Config {
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            llm: LlmConfig {
                provider: "dummy".into(),
                api_base_url: "http://localhost:0".into(),
                default_model: "test-model".into(),
                timeout_seconds: 1,
                stop_sequences: vec!["<|eot_id|>".into()],
            },
            grammar: GrammarConfig {
                api_url: "http://localhost:0/v2/check".into(),
                language: "en-US".into(),
            },
            tts: TtsConfig {
                enabled: false,
                provider: "novelai".into(),
                api_base_url: "http://localhost:0".into(),
                voice: "Crina".into(),
            },
            llm_api_key: None,
            novelai_api_key: None,
        }
    }
}
