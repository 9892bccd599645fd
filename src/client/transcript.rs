use crate::turn::normalize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Transcript text for the current listening attempt
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    interim: String,
    finalized: Option<String>,
    updated_at: Option<Instant>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.interim.clear();
        self.finalized = None;
        self.updated_at = None;
    }

    pub fn set_interim(&mut self, text: &str, now: Instant) {
        self.interim = text.to_string();
        self.updated_at = Some(now);
    }

    pub fn interim(&self) -> &str {
        &self.interim
    }

    pub fn finalized(&self) -> Option<&str> {
        self.finalized.as_deref()
    }

    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    /// Take the interim text if it holds anything besides whitespace
    pub fn take_interim(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.interim);
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    pub fn finalize(&mut self, text: &str, now: Instant) {
        self.interim.clear();
        self.finalized = Some(text.to_string());
        self.updated_at = Some(now);
    }
}

/// Rolling window of recently finalized utterances, compared after
/// trimming and lowercasing
#[derive(Debug, Clone)]
pub struct RecentUtterances {
    window: Duration,
    capacity: usize,
    entries: VecDeque<(String, Instant)>,
}

impl RecentUtterances {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn is_duplicate(&mut self, text: &str, now: Instant) -> bool {
        self.prune(now);
        let key = normalize(text);
        self.entries.iter().any(|(seen, _)| *seen == key)
    }

    pub fn remember(&mut self, text: &str, now: Instant) {
        self.prune(now);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((normalize(text), now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        while let Some((_, at)) = self.entries.front() {
            if now.duration_since(*at) > self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
