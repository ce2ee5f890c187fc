use crate::core::prompt;
use crate::core::transform::{truncate_chars, ContentCleaner};
use crate::domain::model::{AgentAction, AgentOutcome, ChatMessage, PageObservation, ScrapedRecord};
use crate::domain::ports::{BrowserSession, LanguageModel};
use crate::utils::error::{Result, ScrapeError};
use std::collections::HashSet;
use url::Url;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Hard cap on agent steps per run.
    pub max_steps: usize,
    /// Consult the planner model every this many steps (0 disables).
    pub planner_interval: usize,
    pub max_links_per_page: usize,
    pub text_excerpt_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 40,
            planner_interval: 4,
            max_links_per_page: 60,
            text_excerpt_chars: 4000,
        }
    }
}

/// LLM-guided scraping loop over one browser session.
///
/// Each step renders the current page into a prompt, asks the main model for
/// one action, and applies it. The planner model, when present, is consulted
/// every `planner_interval` steps and its reply is carried into later
/// prompts as guidance.
pub struct ScrapeAgent<'a> {
    model: &'a dyn LanguageModel,
    planner: Option<&'a dyn LanguageModel>,
    cleaner: ContentCleaner,
    settings: AgentSettings,
}

impl<'a> ScrapeAgent<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        planner: Option<&'a dyn LanguageModel>,
        cleaner: ContentCleaner,
        settings: AgentSettings,
    ) -> Self {
        Self {
            model,
            planner,
            cleaner,
            settings,
        }
    }

    pub async fn run(
        &self,
        session: &mut dyn BrowserSession,
        task: &str,
    ) -> Result<AgentOutcome> {
        let mut current_base: Option<Url> = None;
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut records: Vec<ScrapedRecord> = Vec::new();
        let mut history: Vec<String> = Vec::new();
        let mut guidance: Option<String> = None;
        let mut finished = false;
        let mut steps_taken = 0;

        for step in 0..self.settings.max_steps {
            steps_taken = step + 1;

            if let Some(planner) = self.planner {
                if step > 0
                    && self.settings.planner_interval > 0
                    && step % self.settings.planner_interval == 0
                {
                    self.consult_planner(planner, task, &history, records.len(), &mut guidance)
                        .await;
                }
            }

            let action = self
                .decide(session, task, current_base.is_some(), records.len(), guidance.as_deref())
                .await?;

            match action {
                AgentAction::Navigate { url } | AgentAction::NextPage { url } => {
                    let target = resolve_url(&url, current_base.as_ref())?;
                    tracing::debug!(step, "navigating to {}", target);
                    session.goto(target.as_str()).await?;
                    history.push(format!("navigated to {}", target));
                    current_base = Some(target);
                }
                AgentAction::Extract => {
                    if current_base.is_none() {
                        return Err(ScrapeError::Agent {
                            message: "extract requested before any page was loaded".to_string(),
                        });
                    }
                    let url = session.current_url().await?;
                    if seen_urls.insert(url.clone()) {
                        let title = self.cleaner.clean_title(&session.title().await?);
                        let content = self.cleaner.clean_content(&session.page_text().await?);
                        tracing::debug!(step, "extracted record from {}", url);
                        history.push(format!("extracted {}", url));
                        records.push(ScrapedRecord { url, title, content });
                    } else {
                        tracing::debug!("skipping duplicate record for {}", url);
                        history.push(format!("skipped duplicate {}", url));
                    }
                }
                AgentAction::Finish { reason } => {
                    tracing::info!(
                        "agent finished after {} steps: {}",
                        steps_taken,
                        reason.as_deref().unwrap_or("no reason given")
                    );
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            tracing::warn!(
                "step budget of {} exhausted, returning {} records collected so far",
                self.settings.max_steps,
                records.len()
            );
        }

        Ok(AgentOutcome {
            records,
            steps_taken,
            finished,
        })
    }

    /// One model turn: render the situation, parse the reply, retry once on
    /// a malformed reply.
    async fn decide(
        &self,
        session: &mut dyn BrowserSession,
        task: &str,
        page_loaded: bool,
        records_collected: usize,
        guidance: Option<&str>,
    ) -> Result<AgentAction> {
        let user_message = if page_loaded {
            let obs = self.observe(session).await?;
            prompt::observation_message(task, &obs, records_collected, guidance)
        } else {
            prompt::initial_message(task)
        };

        let mut messages = vec![
            ChatMessage::system(prompt::system_prompt()),
            ChatMessage::user(user_message),
        ];
        let reply = self.model.complete(&messages).await?;

        match prompt::parse_action(&reply) {
            Ok(action) => Ok(action),
            Err(e) => {
                tracing::debug!("action parse failed, asking the model to restate: {}", e);
                messages.push(ChatMessage::assistant(reply));
                messages.push(ChatMessage::user(prompt::reparse_message(&e.to_string())));
                let retry = self.model.complete(&messages).await?;
                prompt::parse_action(&retry)
            }
        }
    }

    async fn observe(&self, session: &mut dyn BrowserSession) -> Result<PageObservation> {
        let url = session.current_url().await?;
        let title = session.title().await?;
        let text = session.page_text().await?;
        let links = session
            .collect_links(self.settings.max_links_per_page)
            .await?;
        Ok(PageObservation {
            url,
            title,
            text_excerpt: truncate_chars(&text, self.settings.text_excerpt_chars),
            links,
        })
    }

    /// Planner failures are non-fatal: the previous guidance stays in effect.
    async fn consult_planner(
        &self,
        planner: &dyn LanguageModel,
        task: &str,
        history: &[String],
        records_collected: usize,
        guidance: &mut Option<String>,
    ) {
        let recent: Vec<String> = history.iter().rev().take(8).rev().cloned().collect();
        let messages = [
            ChatMessage::system(prompt::planner_system_prompt()),
            ChatMessage::user(prompt::planner_message(task, &recent, records_collected)),
        ];
        match planner.complete(&messages).await {
            Ok(plan) => {
                tracing::debug!("planner guidance: {}", plan.trim());
                *guidance = Some(plan.trim().to_string());
            }
            Err(e) => {
                tracing::warn!("planner consult failed, keeping previous guidance: {}", e);
            }
        }
    }
}

/// Resolve a model-provided URL, joining relative hrefs against the current
/// page. Only http(s) targets are accepted.
fn resolve_url(raw: &str, base: Option<&Url>) -> Result<Url> {
    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| ScrapeError::Agent {
                message: format!("relative URL '{}' before any page was loaded", raw),
            })?;
            base.join(raw).map_err(|e| ScrapeError::Agent {
                message: format!("cannot resolve '{}' against {}: {}", raw, base, e),
            })?
        }
        Err(e) => {
            return Err(ScrapeError::Agent {
                message: format!("invalid URL '{}': {}", raw, e),
            })
        }
    };

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ScrapeError::Agent {
            message: format!("refusing non-http(s) URL '{}' (scheme {})", raw, scheme),
        }),
    }
}
