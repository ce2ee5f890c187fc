pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

pub use crate::adapters::{AzureOpenAiClient, AzureOpenAiSettings, BrowserSettings, WebDriverBrowser};
pub use crate::config::ServiceConfig;
pub use crate::core::agent::AgentSettings;
pub use crate::core::engine::ScrapeEngine;
pub use crate::domain::model::{ScrapeRequest, ScrapedRecord};
pub use crate::server::AppState;
pub use crate::utils::error::{Result, ScrapeError};
