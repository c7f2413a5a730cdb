//! Engagement tracking from viewing sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::types::{node_id, NodeWeight};

/// Smoothing factor of the engagement EMA.
pub const ENGAGEMENT_SMOOTHING: f64 = 0.2;

const DURATION_WEIGHT: f64 = 0.6;
const LINK_WEIGHT: f64 = 0.4;

static WIKI_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|#]*)(?:[|#][^\]]*)?\]\]").unwrap());
static MD_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[[^\]]*\]\([^)]*\)").unwrap());

/// Count wiki links and markdown links in document text. Image embeds
/// (`![alt](src)`) are not links.
pub fn count_links(content: &str) -> usize {
    let markdown = MD_LINK_RE
        .find_iter(content)
        .filter(|m| !m.as_str().starts_with('!'))
        .count();
    WIKI_LINK_RE.find_iter(content).count() + markdown
}

/// Node ids named by the wiki links in `content`, in order of first
/// appearance. Aliases (`[[target|alias]]`) and headings (`[[target#h]]`)
/// are dropped; the target is read as a vault-relative path.
pub fn wiki_link_targets(content: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for caps in WIKI_LINK_RE.captures_iter(content) {
        let target = caps[1].trim();
        if target.is_empty() {
            continue;
        }
        let id = node_id(target);
        if !targets.contains(&id) {
            targets.push(id);
        }
    }
    targets
}

/// Open viewing session for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSession {
    pub start_time: DateTime<Utc>,
    /// Content length in characters.
    pub content_length: usize,
    /// Recorded session durations in milliseconds.
    pub durations: Vec<i64>,
    pub link_count: usize,
}

impl InteractionSession {
    /// Total recorded time in milliseconds.
    pub fn total_millis(&self) -> i64 {
        self.durations.iter().sum()
    }
}

/// Accumulates per-node viewing sessions into an engagement score.
#[derive(Debug, Default)]
pub struct InteractionTracker {
    sessions: HashMap<String, InteractionSession>,
}

impl InteractionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `id`. At most one session per node: a second call
    /// while tracking is a no-op.
    pub fn start_tracking(&mut self, id: &str, content: &str, now: DateTime<Utc>) {
        if self.sessions.contains_key(id) {
            return;
        }
        debug!(node_id = %id, "Starting interaction tracking");
        self.sessions.insert(
            id.to_string(),
            InteractionSession {
                start_time: now,
                content_length: content.chars().count(),
                durations: Vec::new(),
                link_count: count_links(content),
            },
        );
    }

    /// Record the time since the session (re)started and restart it.
    pub fn record_duration(&mut self, id: &str, now: DateTime<Utc>) {
        if let Some(session) = self.sessions.get_mut(id) {
            let elapsed = now
                .signed_duration_since(session.start_time)
                .num_milliseconds()
                .max(0);
            session.durations.push(elapsed);
            session.start_time = now;
        }
    }

    /// Override the link count of an open session.
    pub fn set_link_count(&mut self, id: &str, link_count: usize) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.link_count = link_count;
        }
    }

    pub fn is_tracking(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn session(&self, id: &str) -> Option<&InteractionSession> {
        self.sessions.get(id)
    }

    /// Close and return the session for `id`.
    ///
    /// Hosts call this when a document is closed so duration lists do not
    /// grow without bound.
    pub fn stop_tracking(&mut self, id: &str) -> Option<InteractionSession> {
        self.sessions.remove(id)
    }

    /// Smoothed engagement of `id`, persisted onto `weight`.
    ///
    /// Durations enter in milliseconds, so the raw score is not bounded
    /// by 1. The first sample seeds the EMA. Untracked nodes score 0 and
    /// `weight` is left untouched.
    pub fn engagement(&self, id: &str, weight: &mut NodeWeight) -> f64 {
        let Some(session) = self.sessions.get(id) else {
            return 0.0;
        };

        let raw = (session.total_millis() as f64 * DURATION_WEIGHT
            + session.link_count as f64 * LINK_WEIGHT)
            / session.content_length.max(1) as f64;

        let smoothed = match weight.previous_engagement {
            Some(previous) => ENGAGEMENT_SMOOTHING * raw + (1.0 - ENGAGEMENT_SMOOTHING) * previous,
            None => raw,
        };
        weight.previous_engagement = Some(smoothed);
        smoothed
    }
}
