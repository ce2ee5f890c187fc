use serde::{Deserialize, Serialize};

/// Body of `POST /scrape`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub task: String,
}

/// One extracted article. This is the wire shape of the response array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// A link as seen on the current page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

/// What the agent sees when it looks at the loaded page.
#[derive(Debug, Clone)]
pub struct PageObservation {
    pub url: String,
    pub title: String,
    pub text_excerpt: String,
    pub links: Vec<PageLink>,
}

/// The closed action vocabulary the model replies with, one JSON object per turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    /// Load a URL. The href may be relative; it is resolved against the
    /// page it was observed on.
    Navigate { url: String },
    /// Capture the current page as a record.
    Extract,
    /// Follow pagination to the next listing page.
    NextPage { url: String },
    /// Stop the run.
    Finish {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Result of one agent run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub records: Vec<ScrapedRecord>,
    pub steps_taken: usize,
    /// false when the run stopped because the step budget ran out.
    pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Cookie entry as stored in the cookies file (JSON array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_action_deserializes_navigate() {
        let action: AgentAction =
            serde_json::from_str(r#"{"action": "navigate", "url": "https://example.com"}"#)
                .unwrap();
        assert_eq!(
            action,
            AgentAction::Navigate {
                url: "https://example.com".to_string()
            }
        );
    }

    #[test]
    fn test_agent_action_deserializes_finish_without_reason() {
        let action: AgentAction = serde_json::from_str(r#"{"action": "finish"}"#).unwrap();
        assert_eq!(action, AgentAction::Finish { reason: None });
    }

    #[test]
    fn test_agent_action_rejects_unknown_action() {
        let result: std::result::Result<AgentAction, _> =
            serde_json::from_str(r#"{"action": "teleport"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_scraped_record_wire_shape() {
        let record = ScrapedRecord {
            url: "https://example.com/a".to_string(),
            title: "A".to_string(),
            content: "body".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"url": "https://example.com/a", "title": "A", "content": "body"})
        );
    }
}
