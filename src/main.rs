use clap::Parser;
use scrape_agent::domain::ports::LanguageModel;
use scrape_agent::utils::{logger, validation::Validate};
use scrape_agent::{
    AppState, AzureOpenAiClient, ScrapeEngine, ServiceConfig, WebDriverBrowser,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "scrape-agent")]
#[command(about = "Token-authenticated web-scraping service driven by an LLM browser agent")]
struct Args {
    /// Path to optional TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON (for log collectors)
    #[arg(long)]
    json_logs: bool,

    /// Log process CPU/memory stats around each scrape run
    #[arg(long)]
    monitor: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 先載入 .env，再初始化日誌
    dotenv::dotenv().ok();
    logger::init_server_logger(args.verbose, args.json_logs);

    tracing::info!("🚀 Starting scrape-agent service");

    let mut config = match ServiceConfig::resolve(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(3);
        }
    };

    if let Some(port) = args.port {
        config.port = port;
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(3);
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    display_config_summary(&config);

    let client = reqwest::Client::new();
    let model = Arc::new(AzureOpenAiClient::new(client.clone(), config.llm_settings()));
    let planner: Option<Arc<dyn LanguageModel>> = config
        .planner_settings()
        .map(|settings| Arc::new(AzureOpenAiClient::new(client.clone(), settings)) as _);
    let driver = Arc::new(WebDriverBrowser::new(client, config.browser.clone()));

    let engine = ScrapeEngine::new_with_monitoring(
        driver,
        model,
        planner,
        config.agent.clone(),
        config.cleanup.clone(),
        args.monitor,
    );
    let state = AppState::new(engine, config.api_token.clone());

    match scrape_agent::server::serve(state, config.port).await {
        Ok(()) => {
            tracing::info!("✅ Service shut down cleanly");
        }
        Err(e) => {
            tracing::error!(
                "❌ Service failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                scrape_agent::utils::error::ErrorSeverity::Low => 0,
                scrape_agent::utils::error::ErrorSeverity::Medium => 2,
                scrape_agent::utils::error::ErrorSeverity::High => 1,
                scrape_agent::utils::error::ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &ServiceConfig) {
    println!("📋 Configuration Summary:");
    println!("  Listen: 0.0.0.0:{}", config.port);
    println!("  WebDriver: {}", config.browser.webdriver_url);
    println!("  Model: {}", config.model);
    println!(
        "  Planner: {}",
        config.planner_model.as_deref().unwrap_or("disabled")
    );
    println!(
        "  Agent: max {} steps, planner every {} steps",
        config.agent.max_steps, config.agent.planner_interval
    );
    println!(
        "  Browser window: {}x{}",
        config.browser.window_width, config.browser.window_height
    );
    println!();
}
