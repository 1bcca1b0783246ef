//! Browser session abstraction and the navigation protocol built on it.
//!
//! The collector never talks to a browser directly. It opens sessions through a
//! [`SessionFactory`] and drives them through [`BrowserSession`]; consent
//! dismissal and next-page advancing are expressed here in terms of those
//! primitives so any automation backend (or a test stub) can be plugged in.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{EngineKind, Result};

/// Button texts that accept cookie/consent prompts.
pub const CONSENT_TEXTS: &[&str] = &[
    "Accept all",
    "Accept",
    "Allow all",
    "Allow",
    "I agree",
    "Got it",
    "Yes",
    "OK",
];

/// Strategy for waiting until a navigated page is considered loaded.
#[derive(Debug, Clone, Default)]
pub enum WaitStrategy {
    /// Wait for the page load event only.
    #[default]
    Load,
    /// Wait a fixed delay after the page load event.
    Delay {
        /// Milliseconds to wait after page load.
        ms: u64,
    },
}

/// Bounded retry for next-page advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// One live browser session: a browser process with a single active tab.
///
/// A session is owned by exactly one task and is never shared.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` in the active tab.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Returns the current page markup.
    async fn content(&mut self) -> Result<String>;

    /// Returns false once the session was closed externally (window closed,
    /// browser crashed).
    async fn is_alive(&mut self) -> bool;

    /// Clicks the first element matching `selector`. Returns false when
    /// nothing matched.
    async fn click(&mut self, selector: &str) -> Result<bool>;

    /// Evaluates a script in the page and returns its JSON value.
    async fn evaluate(&mut self, script: &str) -> Result<Value>;

    /// Replaces the active tab with a fresh one.
    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Releases the browser. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Opens independent browser sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Acquires a new session. The caller must `close()` it on every path.
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Builds a script clicking the first visible button or link whose label
/// starts with one of `texts`. The script evaluates to `true` on a click.
pub fn click_by_text_script(texts: &[&str]) -> String {
    let texts = serde_json::to_string(texts).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
    const texts = {texts};
    const nodes = document.querySelectorAll('button, a, [role="button"]');
    for (const node of nodes) {{
        const label = (node.innerText || node.textContent || '').trim();
        if (!label || node.offsetParent === null) continue;
        if (texts.some((t) => label === t || label.startsWith(t))) {{
            node.click();
            return true;
        }}
    }}
    return false;
}})()"#
    )
}

/// Clicks the first visible control labelled with one of `texts`.
pub async fn click_by_text(session: &mut dyn BrowserSession, texts: &[&str]) -> Result<bool> {
    if texts.is_empty() {
        return Ok(false);
    }
    let value = session.evaluate(&click_by_text_script(texts)).await?;
    Ok(value.as_bool().unwrap_or(false))
}

/// Best-effort dismissal of a cookie/consent prompt.
///
/// Returns whether a prompt was clicked. A missing prompt or a failing script
/// is not an error.
pub async fn dismiss_consent(session: &mut dyn BrowserSession) -> bool {
    match click_by_text(session, CONSENT_TEXTS).await {
        Ok(true) => {
            debug!("Consent prompt accepted");
            true
        }
        Ok(false) => {
            debug!("No consent prompt found");
            false
        }
        Err(e) => {
            debug!("Consent dismissal failed: {}", e);
            false
        }
    }
}

/// Triggers the engine's next-page control once.
async fn try_next_page(session: &mut dyn BrowserSession, engine: EngineKind) -> Result<bool> {
    let control = engine.next_page_control();
    for css in control.selectors {
        if session.click(css).await? {
            return Ok(true);
        }
    }
    click_by_text(session, control.texts).await
}

/// Advances to the next results page, retrying per `retry`.
///
/// Returns false when no further page is reachable after all attempts.
pub async fn advance_page(
    session: &mut dyn BrowserSession,
    engine: EngineKind,
    retry: &RetryPolicy,
) -> bool {
    let attempts = retry.attempts.max(1);
    for attempt in 1..=attempts {
        match try_next_page(session, engine).await {
            Ok(true) => return true,
            Ok(false) => debug!(
                "No next-page control on {} (attempt {}/{})",
                engine, attempt, attempts
            ),
            Err(e) => warn!(
                "Failed to advance {} (attempt {}/{}): {}",
                engine, attempt, attempts, e
            ),
        }
        if attempt < attempts && !retry.backoff.is_zero() {
            tokio::time::sleep(retry.backoff).await;
        }
    }
    false
}
