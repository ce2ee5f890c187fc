pub mod azure_openai;
pub mod webdriver;

pub use azure_openai::{AzureOpenAiClient, AzureOpenAiSettings};
pub use webdriver::{BrowserSettings, WebDriverBrowser};
