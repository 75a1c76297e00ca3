//! Content safety filtering

use regex::Regex;

use crate::config::ContentSafetyConfig;
use crate::{GuardrailError, GuardrailResult, Result};

/// Built-in keyword lists per blockable category
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("harassment", &["idiot", "stupid", "moron"]),
    ("hate_speech", &["racial slur"]),
    ("violence", &["kill", "shoot", "bomb"]),
    ("self_harm", &["suicide", "self harm"]),
    ("sexual_content", &["explicit sex"]),
];

/// Keywords of a category; unknown categories have none
pub fn category_keywords(category: &str) -> &'static [&'static str] {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}

/// Content filter
///
/// Blocks text matching a blocked category, topic, keyword or regex
/// pattern, checked in that order. Matching is case-insensitive
/// substring search except for patterns, which run against the original
/// text as written.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    enabled: bool,
    categories: Vec<String>,
    topics: Vec<String>,
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl ContentFilter {
    /// Create a filter blocking the given categories
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            categories: lowercase_all(categories),
            topics: Vec::new(),
            keywords: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Build a filter from configuration, compiling its patterns
    pub fn from_config(config: &ContentSafetyConfig) -> Result<Self> {
        let mut filter = Self::new(config.block_categories.iter().cloned())
            .with_topics(config.topic_blocklist.iter().cloned())
            .with_keywords(config.keyword_blocklist.iter().cloned())
            .enabled(config.enabled);

        for pattern in &config.blocked_patterns {
            filter = filter.with_pattern(pattern)?;
        }

        Ok(filter)
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(lowercase_all(topics));
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(lowercase_all(keywords));
        self
    }

    /// Add a regex pattern to block
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| GuardrailError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        self.patterns.push(regex);
        Ok(self)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether `check` scans anything at all
    ///
    /// An empty category list switches the whole filter off, topics and
    /// keywords included.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.categories.is_empty()
    }

    /// Check text against the filter
    pub fn check(&self, text: &str) -> GuardrailResult {
        if !self.is_active() {
            return GuardrailResult::allow("content_safety_disabled", "Content safety disabled");
        }

        let lowered = text.to_lowercase();

        for category in &self.categories {
            if let Some(keyword) = category_keywords(category)
                .iter()
                .find(|keyword| lowered.contains(*keyword))
            {
                return GuardrailResult::block(
                    format!("content_{}", category),
                    format!("Blocked content category: {}", category),
                )
                .with_detail("category", category.as_str())
                .with_detail("keyword", *keyword);
            }
        }

        if let Some(topic) = self.topics.iter().find(|topic| lowered.contains(topic.as_str())) {
            return GuardrailResult::block("content_topic", format!("Blocked topic: {}", topic))
                .with_detail("topic", topic.as_str());
        }

        if let Some(keyword) = self.keywords.iter().find(|keyword| lowered.contains(keyword.as_str())) {
            return GuardrailResult::block("content_keyword", format!("Blocked keyword: {}", keyword))
                .with_detail("keyword", keyword.as_str());
        }

        if let Some(pattern) = self.patterns.iter().find(|pattern| pattern.is_match(text)) {
            return GuardrailResult::block("content_pattern", "Matches blocked pattern")
                .with_detail("pattern", pattern.as_str());
        }

        GuardrailResult::allow("content_safe", "Content passed safety checks")
    }
}

fn lowercase_all<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(|value| value.into().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
