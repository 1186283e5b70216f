use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Hard upper bound on summary length, regardless of configuration.
pub const MAX_SUMMARY_WORDS: usize = 250;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_SUMMARIZATION_MODEL: &str = "gpt-4o";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_TOKENIZER_DATA_DIR: &str = "data/tokenizer";
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was already installed in the global cache.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the document pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the hosted LLM API. Absence selects the local summarizer.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Model used by the remote summarization strategy.
    pub summarization_model: String,
    /// Word cap applied to every summary (never above [`MAX_SUMMARY_WORDS`]).
    pub summarization_max_words: usize,
    /// Optional system prompt override; `{max_words}` is substituted.
    pub summarization_prompt: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime, when that provider is selected.
    pub ollama_url: String,
    /// Optional override for the automatic chunk size selection.
    pub text_splitter_chunk_size: Option<usize>,
    /// Path or name of the poppler `pdftotext` binary.
    pub pdftotext_bin: String,
    /// Path or name of the LibreOffice `soffice` binary.
    pub soffice_bin: String,
    /// Optional QA checklist policy overriding the bundled one.
    pub checklist_path: Option<PathBuf>,
    /// Directory holding the installed tokenizer data package.
    pub tokenizer_data_dir: PathBuf,
    /// Upper bound for a single external tool invocation.
    pub extraction_timeout: Duration,
    /// Upper bound for a single remote API call.
    pub remote_timeout: Duration,
    /// Maximum accepted upload size for the HTTP surface.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Deterministic feature hashing computed in-process.
    Hashing,
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
}

impl EmbeddingProvider {
    /// Lowercase label matching the `EMBEDDING_PROVIDER` value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hashing => "hashing",
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }

    /// Model identifier used when `EMBEDDING_MODEL` is not set.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Hashing => "feature-hashing-v1",
            Self::Ollama => "all-minilm",
            Self::OpenAI => "text-embedding-3-small",
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let embedding_provider = match optional("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            None => EmbeddingProvider::Hashing,
        };

        let summarization_max_words = parse_optional(&optional, "SUMMARIZATION_MAX_WORDS")?
            .unwrap_or(MAX_SUMMARY_WORDS);
        if summarization_max_words == 0 {
            return Err(ConfigError::InvalidValue(
                "SUMMARIZATION_MAX_WORDS".to_string(),
            ));
        }

        let embedding_dimension = parse_optional(&optional, "EMBEDDING_DIMENSION")?
            .unwrap_or(DEFAULT_EMBEDDING_DIMENSION);
        if embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }

        Ok(Self {
            openai_api_key: optional("OPENAI_API_KEY").map(|key| key.trim().to_string()),
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            summarization_model: optional("SUMMARIZATION_MODEL")
                .unwrap_or_else(|| DEFAULT_SUMMARIZATION_MODEL.to_string()),
            summarization_max_words: summarization_max_words.min(MAX_SUMMARY_WORDS),
            summarization_prompt: optional("SUMMARIZATION_PROMPT"),
            embedding_provider,
            embedding_model: optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| embedding_provider.default_model().to_string()),
            embedding_dimension,
            ollama_url: optional("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            text_splitter_chunk_size: parse_optional(&optional, "TEXT_SPLITTER_CHUNK_SIZE")?,
            pdftotext_bin: optional("PDFTOTEXT_BIN").unwrap_or_else(|| "pdftotext".to_string()),
            soffice_bin: optional("SOFFICE_BIN").unwrap_or_else(|| "soffice".to_string()),
            checklist_path: optional("CHECKLIST_PATH").map(PathBuf::from),
            tokenizer_data_dir: optional("TOKENIZER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKENIZER_DATA_DIR)),
            extraction_timeout: Duration::from_secs(
                parse_optional(&optional, "EXTRACTION_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            ),
            remote_timeout: Duration::from_secs(
                parse_optional(&optional, "REMOTE_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
            ),
            max_upload_bytes: parse_optional(&optional, "MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            server_port: parse_optional(&optional, "SERVER_PORT")?,
        })
    }

    /// Whether a remote credential is configured.
    pub fn has_remote_credential(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn parse_optional<T, F>(optional: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "local" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        summarization_model = %config.summarization_model,
        has_credential = config.has_remote_credential(),
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    Ok(get_config())
}
