use crate::core::agent::{AgentSettings, ScrapeAgent};
use crate::core::transform::{CleanupSettings, ContentCleaner};
use crate::domain::model::AgentOutcome;
use crate::domain::ports::{BrowserDriver, LanguageModel};
use crate::utils::error::Result;
use std::sync::Arc;

/// Orchestrates one scrape run: opens a browser session, drives the agent,
/// and closes the session whatever the outcome.
pub struct ScrapeEngine {
    driver: Arc<dyn BrowserDriver>,
    model: Arc<dyn LanguageModel>,
    planner: Option<Arc<dyn LanguageModel>>,
    agent_settings: AgentSettings,
    cleanup: CleanupSettings,
    monitoring: bool,
}

impl ScrapeEngine {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        model: Arc<dyn LanguageModel>,
        planner: Option<Arc<dyn LanguageModel>>,
        agent_settings: AgentSettings,
        cleanup: CleanupSettings,
    ) -> Self {
        Self {
            driver,
            model,
            planner,
            agent_settings,
            cleanup,
            monitoring: false,
        }
    }

    pub fn new_with_monitoring(
        driver: Arc<dyn BrowserDriver>,
        model: Arc<dyn LanguageModel>,
        planner: Option<Arc<dyn LanguageModel>>,
        agent_settings: AgentSettings,
        cleanup: CleanupSettings,
        monitoring: bool,
    ) -> Self {
        Self {
            monitoring,
            ..Self::new(driver, model, planner, agent_settings, cleanup)
        }
    }

    pub async fn run(&self, task: &str) -> Result<AgentOutcome> {
        tracing::info!("Starting scrape run");

        #[cfg(feature = "cli")]
        let monitor = crate::utils::monitor::SystemMonitor::new(self.monitoring);
        #[cfg(feature = "cli")]
        monitor.log_stats("scrape start");
        #[cfg(not(feature = "cli"))]
        let _ = self.monitoring;

        tracing::debug!("Opening browser session");
        let mut session = self.driver.open_session().await?;

        let agent = ScrapeAgent::new(
            self.model.as_ref(),
            self.planner.as_deref(),
            ContentCleaner::new(self.cleanup.clone()),
            self.agent_settings.clone(),
        );
        let outcome = agent.run(session.as_mut(), task).await;

        // 無論成功或失敗都要關閉 browser session
        if let Err(e) = session.close().await {
            tracing::warn!("failed to close browser session: {}", e);
        }

        let outcome = outcome?;
        tracing::info!(
            "Scrape run complete: {} records in {} steps (finished: {})",
            outcome.records.len(),
            outcome.steps_taken,
            outcome.finished
        );

        #[cfg(feature = "cli")]
        monitor.log_stats("scrape end");

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ChatMessage, PageLink};
    use crate::domain::ports::BrowserSession;
    use crate::utils::error::ScrapeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct OneShotModel {
        reply: String,
    }

    #[async_trait]
    impl LanguageModel for OneShotModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            if self.reply.is_empty() {
                return Err(ScrapeError::Llm {
                    status: Some(500),
                    message: "backend down".to_string(),
                });
            }
            Ok(self.reply.clone())
        }
    }

    struct TrackedSession {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserSession for TrackedSession {
        async fn goto(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok("https://site.test/".to_string())
        }
        async fn title(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn page_text(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn collect_links(&self, _limit: usize) -> Result<Vec<PageLink>> {
            Ok(Vec::new())
        }
        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TrackedDriver {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserDriver for TrackedDriver {
        async fn open_session(&self) -> Result<Box<dyn BrowserSession>> {
            Ok(Box::new(TrackedSession {
                closed: self.closed.clone(),
            }))
        }
    }

    fn engine(reply: &str, closed: Arc<AtomicBool>) -> ScrapeEngine {
        ScrapeEngine::new(
            Arc::new(TrackedDriver { closed }),
            Arc::new(OneShotModel {
                reply: reply.to_string(),
            }),
            None,
            AgentSettings::default(),
            CleanupSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_run_closes_session_on_success() {
        let closed = Arc::new(AtomicBool::new(false));
        let outcome = engine(r#"{"action": "finish"}"#, closed.clone())
            .run("task")
            .await
            .unwrap();

        assert!(outcome.finished);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_closes_session_on_agent_failure() {
        let closed = Arc::new(AtomicBool::new(false));
        let err = engine("", closed.clone()).run("task").await.unwrap_err();

        assert!(err.to_string().contains("backend down"));
        assert!(closed.load(Ordering::SeqCst));
    }
}
