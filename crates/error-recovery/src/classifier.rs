use std::collections::BTreeMap;

use browser_agent::AgentError;
use webrunner_core_types::ErrorKind;

use crate::types::{ErrorClassification, RecoveryAction, RecoveryContext};

/// Keyword sets per category, checked against the lowercased message.
const NETWORK_KEYWORDS: &[&str] = &[
    "network",
    "connection",
    "dns",
    "socket",
    "refused",
    "reset",
    "err_internet",
];
const TIMING_KEYWORDS: &[&str] = &["timeout", "timed out", "deadline", "too slow"];
const NAVIGATION_KEYWORDS: &[&str] = &["navigation", "navigate", "net::err", "err_aborted"];
const SELECTOR_KEYWORDS: &[&str] = &[
    "not found",
    "no element",
    "no node",
    "unable to locate",
    "selector",
];
const INTERACT_KEYWORDS: &[&str] = &[
    "not interactable",
    "not clickable",
    "obscured",
    "not visible",
    "intercept",
    "disabled",
];
const CRASH_KEYWORDS: &[&str] = &[
    "crash",
    "target closed",
    "session closed",
    "disconnected",
];
const SCRIPT_KEYWORDS: &[&str] = &["javascript", "script error", "uncaught", "evaluation failed"];
const PERMISSION_KEYWORDS: &[&str] = &["permission", "denied", "forbidden", "blocked"];
const TRANSIENT_KEYWORDS: &[&str] = &["rate limit", "temporarily", "try again", "502", "503"];

/// Classify a browser-agent failure.
///
/// Deterministic: the same error always yields the same kind. Starts from
/// the error variant, then lets message keywords confirm (raising
/// confidence) or refine the kind. Confidence stays in [0.5, 0.95].
pub fn classify(error: &AgentError, context: Option<&RecoveryContext>) -> ErrorClassification {
    let message = error.to_string();
    let lowered = message.to_lowercase();

    let (kind, confidence) = match error {
        AgentError::Cancelled => (ErrorKind::Cancelled, 0.95),
        AgentError::Session { .. } => refine_by_keywords(&lowered),
        other => {
            let kind = other.kind();
            let confirmed = keywords_for(kind)
                .iter()
                .any(|keyword| lowered.contains(keyword));
            (kind, if confirmed { 0.9 } else { 0.75 })
        }
    };

    let mut ctx_map = BTreeMap::new();
    if let Some(ctx) = context {
        if let Some(url) = &ctx.url {
            ctx_map.insert("url".to_string(), url.clone());
        }
        if let Some(selector) = &ctx.selector {
            ctx_map.insert("selector".to_string(), selector.clone());
        }
        if let Some(action) = &ctx.action {
            ctx_map.insert("action".to_string(), action.clone());
        }
    }

    ErrorClassification {
        kind,
        confidence,
        message,
        suggested_actions: suggested_actions(kind),
        context: ctx_map,
    }
}

/// Untyped errors fall back to pure keyword detection.
fn refine_by_keywords(lowered: &str) -> (ErrorKind, f64) {
    let categories: &[(ErrorKind, &[&str])] = &[
        (ErrorKind::PageCrash, CRASH_KEYWORDS),
        (ErrorKind::ElementNotInteractable, INTERACT_KEYWORDS),
        (ErrorKind::SelectorNotFound, SELECTOR_KEYWORDS),
        (ErrorKind::NavigationTimeout, NAVIGATION_KEYWORDS),
        (ErrorKind::TimingIssue, TIMING_KEYWORDS),
        (ErrorKind::NetworkError, NETWORK_KEYWORDS),
        (ErrorKind::PermissionDenied, PERMISSION_KEYWORDS),
        (ErrorKind::JavaScriptError, SCRIPT_KEYWORDS),
        (ErrorKind::Transient, TRANSIENT_KEYWORDS),
    ];

    for (kind, keywords) in categories {
        let hits = keywords
            .iter()
            .filter(|keyword| lowered.contains(*keyword))
            .count();
        if hits > 0 {
            return (*kind, if hits > 1 { 0.85 } else { 0.75 });
        }
    }
    (ErrorKind::Unknown, 0.5)
}

fn keywords_for(kind: ErrorKind) -> &'static [&'static str] {
    match kind {
        ErrorKind::NetworkError => NETWORK_KEYWORDS,
        ErrorKind::TimingIssue => TIMING_KEYWORDS,
        ErrorKind::NavigationTimeout => NAVIGATION_KEYWORDS,
        ErrorKind::SelectorNotFound => SELECTOR_KEYWORDS,
        ErrorKind::ElementNotInteractable => INTERACT_KEYWORDS,
        ErrorKind::PageCrash => CRASH_KEYWORDS,
        ErrorKind::JavaScriptError => SCRIPT_KEYWORDS,
        ErrorKind::PermissionDenied => PERMISSION_KEYWORDS,
        ErrorKind::Transient => TRANSIENT_KEYWORDS,
        _ => &[],
    }
}

/// Fixed kind -> ordered recovery actions table.
pub(crate) fn suggested_actions(kind: ErrorKind) -> Vec<RecoveryAction> {
    use RecoveryAction::*;
    match kind {
        ErrorKind::Transient => vec![WaitAndRetry],
        ErrorKind::NetworkError => vec![WaitAndRetry, NavigationRetry],
        ErrorKind::TimingIssue => vec![WaitForStability, WaitAndRetry],
        ErrorKind::NavigationTimeout => vec![NavigationRetry, WaitAndRetry],
        ErrorKind::SelectorNotFound => vec![AlternativeSelector, WaitForStability, PageRefresh],
        ErrorKind::ElementNotInteractable => vec![WaitForStability, AlternativeSelector],
        ErrorKind::PageCrash => vec![RestartContext, NavigationRetry],
        ErrorKind::JavaScriptError => vec![PageRefresh, WaitAndRetry],
        ErrorKind::PermissionDenied => vec![ClearCookies, PageRefresh],
        ErrorKind::Unknown => vec![WaitAndRetry, PageRefresh],
        ErrorKind::InvalidParameters | ErrorKind::UnknownTool | ErrorKind::Cancelled => Vec::new(),
    }
}
