pub mod toml_config;

use crate::adapters::azure_openai::AzureOpenAiSettings;
use crate::adapters::webdriver::BrowserSettings;
use crate::core::agent::AgentSettings;
use crate::core::transform::CleanupSettings;
use crate::utils::error::{Result, ScrapeError};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use std::path::PathBuf;
use std::time::Duration;
use toml_config::TomlConfig;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_PLANNER_MODEL: &str = "o3-mini";

/// Fully resolved service configuration.
///
/// Layering, later wins: built-in defaults, then the optional TOML file,
/// then environment variables (`.env` is loaded by the binary before this
/// runs).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub api_token: String,
    pub azure_endpoint: String,
    pub azure_api_key: String,
    pub api_version: String,
    pub model: String,
    pub planner_model: Option<String>,
    pub temperature: f32,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub agent: AgentSettings,
    pub cleanup: CleanupSettings,
    pub browser: BrowserSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_token: String::new(),
            azure_endpoint: String::new(),
            azure_api_key: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            planner_model: Some(DEFAULT_PLANNER_MODEL.to_string()),
            temperature: 1.0,
            retry_attempts: 2,
            retry_delay: Duration::from_secs(2),
            agent: AgentSettings::default(),
            cleanup: CleanupSettings::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the effective configuration: defaults, then the optional TOML
    /// file, then environment variables.
    pub fn resolve(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = config_path {
            config.apply_toml(TomlConfig::from_file(path)?);
        }
        config.apply_env();
        Ok(config)
    }

    pub fn apply_toml(&mut self, file: TomlConfig) {
        if let Some(server) = file.server {
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(token) = server.api_token {
                self.api_token = token;
            }
        }

        if let Some(agent) = file.agent {
            if let Some(v) = agent.max_steps {
                self.agent.max_steps = v;
            }
            if let Some(v) = agent.planner_interval {
                self.agent.planner_interval = v;
            }
            if let Some(v) = agent.max_links_per_page {
                self.agent.max_links_per_page = v;
            }
            if let Some(v) = agent.text_excerpt_chars {
                self.agent.text_excerpt_chars = v;
            }
            if let Some(v) = agent.max_title_length {
                self.cleanup.max_title_length = v;
            }
            if let Some(v) = agent.max_content_chars {
                self.cleanup.max_content_chars = v;
            }
        }

        if let Some(browser) = file.browser {
            if let Some(v) = browser.webdriver_url {
                self.browser.webdriver_url = v;
            }
            if let Some(v) = browser.window_width {
                self.browser.window_width = v;
            }
            if let Some(v) = browser.window_height {
                self.browser.window_height = v;
            }
            if let Some(v) = browser.locale {
                self.browser.locale = v;
            }
            if let Some(v) = browser.user_agent {
                self.browser.user_agent = v;
            }
            if let Some(v) = browser.page_settle_seconds {
                self.browser.page_settle = Duration::from_secs_f64(v);
            }
            if let Some(v) = browser.cookies_file {
                self.browser.cookies_file = if v.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(v))
                };
            }
            if let Some(v) = browser.headless {
                self.browser.headless = v;
            }
        }

        if let Some(llm) = file.llm {
            if let Some(v) = llm.endpoint {
                self.azure_endpoint = v;
            }
            if let Some(v) = llm.api_key {
                self.azure_api_key = v;
            }
            if let Some(v) = llm.api_version {
                self.api_version = v;
            }
            if let Some(v) = llm.model {
                self.model = v;
            }
            if let Some(v) = llm.planner_model {
                self.planner_model = if v.is_empty() { None } else { Some(v) };
            }
            if let Some(v) = llm.temperature {
                self.temperature = v;
            }
            if let Some(v) = llm.retry_attempts {
                self.retry_attempts = v;
            }
            if let Some(v) = llm.retry_delay_seconds {
                self.retry_delay = Duration::from_secs(v);
            }
        }
    }

    /// 環境變數優先權最高，對應容器部署時的注入方式
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("API_TOKEN") {
            self.api_token = token;
        }
        if let Ok(endpoint) = std::env::var("AZURE_OPENAI_ENDPOINT") {
            self.azure_endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("AZURE_OPENAI_API_KEY") {
            self.azure_api_key = key;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.model = model;
        }
        if let Ok(model) = std::env::var("PLANNER_LLM_MODEL") {
            self.planner_model = if model.is_empty() { None } else { Some(model) };
        }
        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            self.browser.webdriver_url = url;
        }
        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("ignoring unparsable PORT value '{}'", port),
            }
        }
    }

    pub fn llm_settings(&self) -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint: self.azure_endpoint.clone(),
            api_key: self.azure_api_key.clone(),
            deployment: self.model.clone(),
            api_version: self.api_version.clone(),
            temperature: self.temperature,
            retry_attempts: self.retry_attempts,
            retry_delay: self.retry_delay,
        }
    }

    pub fn planner_settings(&self) -> Option<AzureOpenAiSettings> {
        self.planner_model.as_ref().map(|model| AzureOpenAiSettings {
            deployment: model.clone(),
            ..self.llm_settings()
        })
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(ScrapeError::MissingConfig {
                field: "API_TOKEN".to_string(),
            });
        }
        if self.azure_endpoint.trim().is_empty() {
            return Err(ScrapeError::MissingConfig {
                field: "AZURE_OPENAI_ENDPOINT".to_string(),
            });
        }
        if self.azure_api_key.trim().is_empty() {
            return Err(ScrapeError::MissingConfig {
                field: "AZURE_OPENAI_API_KEY".to_string(),
            });
        }

        validate_url("AZURE_OPENAI_ENDPOINT", &self.azure_endpoint)?;
        validate_url("webdriver_url", &self.browser.webdriver_url)?;
        validate_non_empty_string("model", &self.model)?;
        validate_positive_number("port", self.port as usize, 1)?;
        validate_positive_number("max_steps", self.agent.max_steps, 1)?;
        validate_positive_number("planner_interval", self.agent.planner_interval, 1)?;
        validate_positive_number("max_links_per_page", self.agent.max_links_per_page, 1)?;
        validate_range("temperature", self.temperature, 0.0, 2.0)?;

        Ok(())
    }
}
