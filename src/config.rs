use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Google,
    OpenAi,
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "openai" => Ok(Provider::OpenAi),
            other => anyhow::bail!("unknown provider {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Provider,
    pub openai_api_key: String,
    pub openai_model: String,
    pub source_lang: String,
    pub target_lang: String,
    pub auto_translate_delay_ms: u64,
    pub particle_count: usize,
    pub tts_rate: i32,
    pub tts_volume: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::Google,
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            source_lang: crate::languages::AUTO_DETECT.to_string(),
            target_lang: "English".to_string(),
            auto_translate_delay_ms: 650,
            particle_count: crate::particles::DEFAULT_PARTICLES,
            tts_rate: crate::speech::DEFAULT_RATE,
            tts_volume: crate::speech::DEFAULT_VOLUME,
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        let dir = exe.parent().unwrap_or(Path::new("."));
        dir.join("config.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Missing or unreadable files yield the defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str::<Config>(&s).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Environment variables win over the file when set and non-empty.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| var(name).filter(|v| !v.is_empty());
        if let Some(v) = var("NEONTRANS_PROVIDER") {
            match v.parse() {
                Ok(p) => self.provider = p,
                Err(e) => log::warn!("NEONTRANS_PROVIDER: {e}"),
            }
        }
        if let Some(v) = var("OPENAI_API_KEY") { self.openai_api_key = v; }
        if let Some(v) = var("OPENAI_MODEL") { self.openai_model = v; }
        if let Some(v) = var("NEONTRANS_TARGET_LANG") { self.target_lang = v; }
    }
}
