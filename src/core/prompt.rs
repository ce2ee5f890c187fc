use crate::core::transform::truncate_chars;
use crate::domain::model::{AgentAction, PageObservation};
use crate::utils::error::{Result, ScrapeError};

/// Fixed instructions given to the main model. English rendition of the
/// operator brief this service was built around.
pub fn system_prompt() -> String {
    r#"You are an expert web-scraping assistant driving a real browser session.

Your job, given a task description:
1. Start from the entry page the task names and page through listing pages until no "next page" remains.
2. On each listing page, open every article item, extract its full url, title and content, then return to the listing.
3. When a link is relative, resolve it against the URL of the page you saw it on; the final records must carry absolute URLs.
4. Collected records have the shape {"url": ..., "title": ..., "content": ...}.

On every turn you reply with exactly ONE JSON object and nothing else, chosen from:
  {"action": "navigate", "url": "<url>"}    -- load a page (use this for article links too)
  {"action": "extract"}                       -- capture the currently loaded page as a record
  {"action": "next_page", "url": "<url>"}   -- follow pagination to the next listing page
  {"action": "finish", "reason": "<why>"}   -- stop when the task is complete or nothing is left

Use "extract" only when an article page is loaded. Do not extract listing pages.
Do not invent URLs: navigate only to links you have seen or to the task's entry URL."#
        .to_string()
}

/// First user turn: no page is loaded yet, the model must open the entry page.
pub fn initial_message(task: &str) -> String {
    format!(
        "Task: {}\n\nNo page is loaded yet. Reply with a navigate action for the entry URL of this task.",
        task
    )
}

/// Per-turn user message rendering the current page and progress.
pub fn observation_message(
    task: &str,
    obs: &PageObservation,
    records_collected: usize,
    guidance: Option<&str>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Task: {}\n\n", task));
    out.push_str(&format!("Current page: {}\n", obs.url));
    out.push_str(&format!("Title: {}\n", obs.title));
    out.push_str(&format!("Records collected so far: {}\n", records_collected));
    if let Some(guidance) = guidance {
        out.push_str(&format!("Planner guidance: {}\n", guidance));
    }
    out.push_str("\nLinks on this page:\n");
    for link in &obs.links {
        let text = truncate_chars(link.text.trim(), 120);
        out.push_str(&format!("- [{}]({})\n", text, link.href));
    }
    out.push_str("\nPage text (excerpt):\n");
    out.push_str(&obs.text_excerpt);
    out.push_str("\n\nReply with the next action as a single JSON object.");
    out
}

/// Corrective turn appended after a reply that failed to parse.
pub fn reparse_message(parse_error: &str) -> String {
    format!(
        "Your last reply was not a valid action object ({}). Reply again with exactly one JSON object from the documented action vocabulary, with no surrounding text.",
        parse_error
    )
}

pub fn planner_system_prompt() -> String {
    "You supervise a web-scraping agent. Given its task and recent activity, state in at most three sentences what it should do over its next few steps. Plain text, no JSON.".to_string()
}

pub fn planner_message(task: &str, recent_activity: &[String], records_collected: usize) -> String {
    format!(
        "Task: {}\n\nRecords collected: {}\nRecent activity:\n{}",
        task,
        records_collected,
        recent_activity
            .iter()
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Strict parse of the model's action reply. Tolerates a fenced code block
/// or stray prose around the object, nothing else.
pub fn parse_action(reply: &str) -> Result<AgentAction> {
    let trimmed = reply.trim();

    match serde_json::from_str::<AgentAction>(trimmed) {
        Ok(action) => Ok(action),
        Err(first_err) => {
            // ```json ... ``` 或前後多了說明文字時，取出第一個物件再試一次
            let start = trimmed.find('{');
            let end = trimmed.rfind('}');
            if let (Some(start), Some(end)) = (start, end) {
                if start < end {
                    if let Ok(action) = serde_json::from_str::<AgentAction>(&trimmed[start..=end]) {
                        return Ok(action);
                    }
                }
            }
            Err(ScrapeError::Agent {
                message: format!("model reply is not a valid action: {}", first_err),
            })
        }
    }
}
