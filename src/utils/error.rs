use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Browser error: {message}")]
    Browser { message: String },

    #[error("LLM request failed{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Llm { status: Option<u16>, message: String },

    #[error("Agent error: {message}")]
    Agent { message: String },
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// 錯誤分類，決定 HTTP 回應與重試策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Browser,
    Llm,
    Agent,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ScrapeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScrapeError::Http(_) => ErrorCategory::Network,
            ScrapeError::Serialization(_) => ErrorCategory::Data,
            ScrapeError::Io(_) => ErrorCategory::System,
            ScrapeError::Config { .. }
            | ScrapeError::MissingConfig { .. }
            | ScrapeError::InvalidConfigValue { .. } => ErrorCategory::Configuration,
            ScrapeError::Validation { .. } => ErrorCategory::Data,
            ScrapeError::Browser { .. } => ErrorCategory::Browser,
            ScrapeError::Llm { .. } => ErrorCategory::Llm,
            ScrapeError::Agent { .. } => ErrorCategory::Agent,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ScrapeError::Validation { .. } => ErrorSeverity::Low,
            ScrapeError::Http(_) | ScrapeError::Llm { .. } | ScrapeError::Browser { .. } => {
                ErrorSeverity::Medium
            }
            ScrapeError::Serialization(_) | ScrapeError::Agent { .. } => ErrorSeverity::High,
            ScrapeError::Io(_)
            | ScrapeError::Config { .. }
            | ScrapeError::MissingConfig { .. }
            | ScrapeError::InvalidConfigValue { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ScrapeError::Http(_) => {
                "Check network connectivity and that the upstream service is reachable".to_string()
            }
            ScrapeError::Serialization(_) => {
                "The upstream returned malformed JSON; retry the request".to_string()
            }
            ScrapeError::Io(_) => "Check file paths and filesystem permissions".to_string(),
            ScrapeError::Config { .. } => "Review the configuration file syntax".to_string(),
            ScrapeError::MissingConfig { field } => {
                format!("Set '{}' via environment or config file", field)
            }
            ScrapeError::InvalidConfigValue { field, .. } => {
                format!("Correct the value of '{}'", field)
            }
            ScrapeError::Validation { .. } => "Correct the request payload".to_string(),
            ScrapeError::Browser { .. } => {
                "Check that the WebDriver remote is running and reachable".to_string()
            }
            ScrapeError::Llm { status, .. } => match status {
                Some(401) | Some(403) => {
                    "Check AZURE_OPENAI_API_KEY validity and permissions".to_string()
                }
                Some(404) => {
                    "Check AZURE_OPENAI_ENDPOINT and the deployment name".to_string()
                }
                Some(429) => "The LLM endpoint is rate limiting; retry later".to_string(),
                _ => "Check the LLM endpoint configuration and retry".to_string(),
            },
            ScrapeError::Agent { .. } => {
                "Rephrase the task or raise the step budget".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ScrapeError::Http(_) => "A network request to an upstream service failed".to_string(),
            ScrapeError::Serialization(_) => "An upstream response could not be parsed".to_string(),
            ScrapeError::Io(e) => format!("File system error: {}", e),
            ScrapeError::Config { message } => format!("Configuration problem: {}", message),
            ScrapeError::MissingConfig { field } => {
                format!("Missing required configuration: {}", field)
            }
            ScrapeError::InvalidConfigValue { field, reason, .. } => {
                format!("Invalid configuration '{}': {}", field, reason)
            }
            ScrapeError::Validation { message } => format!("Invalid request: {}", message),
            ScrapeError::Browser { message } => format!("Browser automation failed: {}", message),
            ScrapeError::Llm { message, .. } => format!("Language model call failed: {}", message),
            ScrapeError::Agent { message } => format!("Scraping agent failed: {}", message),
        }
    }
}
