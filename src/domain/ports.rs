use crate::domain::model::{ChatMessage, PageLink};
use crate::utils::error::Result;
use async_trait::async_trait;

/// A chat-completion backend. One implementation per deployment; the agent
/// holds two (main model and planner model).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// One live browser session. Sessions are request-scoped: opened per scrape
/// call, closed (or dropped) when the call ends.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    async fn title(&self) -> Result<String>;
    /// Visible text of the page body.
    async fn page_text(&self) -> Result<String>;
    /// Anchor hrefs with their visible text, capped at `limit`.
    async fn collect_links(&self, limit: usize) -> Result<Vec<PageLink>>;
    async fn close(&mut self) -> Result<()>;
}

/// Factory for browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>>;
}
