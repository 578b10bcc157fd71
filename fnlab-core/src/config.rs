use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, InternalResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub sandbox: SandboxLimits,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub transformer: TransformerConfig,

    #[serde(default)]
    pub scratch: ScratchConfig,

    /// Larger submissions are rejected before parsing.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
}

/// Quotas applied to every execution of untrusted code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxLimits {
    #[serde(default = "default_timeout", with = "duration_ms")]
    pub timeout: Duration,
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
    /// Elements of a list/tuple/dict/set, or characters of a string.
    #[serde(default = "default_max_collection_len")]
    pub max_collection_len: usize,
    #[serde(default = "default_max_stdout_bytes")]
    pub max_stdout_bytes: usize,
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_steps: default_max_steps(),
            max_call_depth: default_max_call_depth(),
            max_collection_len: default_max_collection_len(),
            max_stdout_bytes: default_max_stdout_bytes(),
            stack_size: default_stack_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
    #[serde(default = "default_session_ttl", with = "duration_ms")]
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            ttl: default_session_ttl(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransformerKind {
    /// OpenAI-compatible chat completion endpoint.
    #[default]
    OpenaiChat,
    /// Fixed pattern/reply table; never leaves the process.
    Canned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannedResponse {
    pub pattern: String,
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerConfig {
    #[serde(default)]
    pub kind: TransformerKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout", with = "duration_ms")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub canned_responses: Vec<CannedResponse>,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            kind: TransformerKind::default(),
            model: default_model(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout: default_request_timeout(),
            canned_responses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchConfig {
    #[serde(default = "default_scratch_root")]
    pub root: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: default_scratch_root(),
        }
    }
}

/// シークレット設定(secret.json)
///
/// The key is never serialized or printed; without one every transformation
/// takes the fallback path.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SecretConfig {
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

impl SecretConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            api_key: (!api_key.trim().is_empty()).then(|| SecretString::from(api_key)),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Internal(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Internal(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Internal(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

// デフォルト値の定義
fn default_max_source_bytes() -> usize {
    256 * 1024
}

fn default_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_max_steps() -> u64 {
    1_000_000
}

fn default_max_call_depth() -> usize {
    64
}

fn default_max_collection_len() -> usize {
    100_000
}

fn default_max_stdout_bytes() -> usize {
    64 * 1024
}

fn default_stack_size() -> usize {
    64 * 1024 * 1024
}

fn default_max_sessions() -> u64 {
    10_000
}

fn default_session_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_model() -> String {
    "mixtral-8x7b-32768".to_string()
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("fnlab-uploads")
}

// Duration型のシリアライズ/デシリアライズヘルパー
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxLimits::default(),
            session: SessionConfig::default(),
            transformer: TransformerConfig::default(),
            scratch: ScratchConfig::default(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

impl SystemConfig {
    // JSONファイルから設定を読み込む
    pub fn from_file(path: &str) -> InternalResult<Self> {
        from_file(path)
    }
}
