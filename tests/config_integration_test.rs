use anyhow::Result;
use scrape_agent::utils::validation::Validate;
use scrape_agent::ServiceConfig;
use std::time::Duration;
use tempfile::TempDir;

/// 單一測試內依序驗證檔案與環境變數的疊加順序，避免平行測試
/// 互相污染 process 環境
#[test]
fn test_config_layering_file_then_env() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("scrape-agent.toml");
    std::fs::write(
        &config_path,
        r#"
[server]
port = 9200
api_token = "file-token"

[agent]
max_steps = 12

[browser]
webdriver_url = "http://chromedriver:9515"
page_settle_seconds = 1.5

[llm]
endpoint = "https://file-res.openai.azure.com"
api_key = "${SCRAPE_AGENT_FILE_KEY}"
model = "gpt-from-file"
"#,
    )?;

    std::env::set_var("SCRAPE_AGENT_FILE_KEY", "substituted-key");
    std::env::remove_var("API_TOKEN");
    std::env::remove_var("AZURE_OPENAI_ENDPOINT");
    std::env::remove_var("AZURE_OPENAI_API_KEY");
    std::env::remove_var("LLM_MODEL");
    std::env::remove_var("PLANNER_LLM_MODEL");
    std::env::remove_var("WEBDRIVER_URL");
    std::env::remove_var("PORT");

    // 只有設定檔時，檔案值生效（含 ${VAR} 替換）
    let config = ServiceConfig::resolve(Some(config_path.to_str().unwrap()))?;
    assert_eq!(config.port, 9200);
    assert_eq!(config.api_token, "file-token");
    assert_eq!(config.azure_api_key, "substituted-key");
    assert_eq!(config.model, "gpt-from-file");
    assert_eq!(config.agent.max_steps, 12);
    assert_eq!(config.browser.webdriver_url, "http://chromedriver:9515");
    assert_eq!(config.browser.page_settle, Duration::from_millis(1500));
    assert!(config.validate().is_ok());

    // 環境變數疊在檔案之上
    std::env::set_var("API_TOKEN", "env-token");
    std::env::set_var("LLM_MODEL", "gpt-from-env");
    std::env::set_var("PORT", "9300");

    let config = ServiceConfig::resolve(Some(config_path.to_str().unwrap()))?;
    assert_eq!(config.api_token, "env-token");
    assert_eq!(config.model, "gpt-from-env");
    assert_eq!(config.port, 9300);
    // 檔案值在環境變數未覆蓋處仍然生效
    assert_eq!(config.agent.max_steps, 12);

    std::env::remove_var("API_TOKEN");
    std::env::remove_var("LLM_MODEL");
    std::env::remove_var("PORT");
    std::env::remove_var("SCRAPE_AGENT_FILE_KEY");
    Ok(())
}

#[test]
fn test_missing_config_file_is_an_error() {
    let err = ServiceConfig::resolve(Some("/definitely/not/here.toml")).unwrap_err();
    assert!(matches!(err, scrape_agent::ScrapeError::Io(_)));
}

#[test]
fn test_default_config_fails_validation_without_secrets() {
    let config = ServiceConfig {
        api_token: String::new(),
        azure_endpoint: String::new(),
        azure_api_key: String::new(),
        ..ServiceConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("API_TOKEN"));
}
