use crate::utils::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional file-based configuration. Every field is optional; anything left
/// out keeps its built-in default, and environment variables still win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server: Option<ServerSection>,
    pub agent: Option<AgentSection>,
    pub browser: Option<BrowserSection>,
    pub llm: Option<LlmSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSection {
    pub max_steps: Option<usize>,
    pub planner_interval: Option<usize>,
    pub max_links_per_page: Option<usize>,
    pub text_excerpt_chars: Option<usize>,
    pub max_title_length: Option<usize>,
    pub max_content_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserSection {
    pub webdriver_url: Option<String>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub locale: Option<String>,
    pub user_agent: Option<String>,
    pub page_settle_seconds: Option<f64>,
    pub cookies_file: Option<String>,
    pub headless: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSection {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub model: Option<String>,
    pub planner_model: Option<String>,
    pub temperature: Option<f32>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScrapeError::Io)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScrapeError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}
