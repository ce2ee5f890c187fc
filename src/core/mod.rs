pub mod agent;
pub mod engine;
pub mod prompt;
pub mod transform;

pub use crate::domain::model::{AgentAction, AgentOutcome, ScrapeRequest, ScrapedRecord};
pub use crate::domain::ports::{BrowserDriver, BrowserSession, LanguageModel};
pub use crate::utils::error::Result;
