//! Input length limits and prompt injection detection

use std::fs;
use std::path::Path;

use crate::config::InputValidationConfig;
use crate::{GuardrailError, GuardrailResult, Result};

/// Validates user input before it reaches the model
#[derive(Debug, Clone)]
pub struct InputValidator {
    max_length: usize,
    max_tokens: usize,
    block_injection: bool,
    patterns: Vec<String>,
}

impl InputValidator {
    /// Create a validator with length limits and no injection patterns
    pub fn new(max_length: usize, max_tokens: usize) -> Self {
        Self {
            max_length,
            max_tokens,
            block_injection: true,
            patterns: Vec::new(),
        }
    }

    /// Build a validator from configuration, reading the pattern file if set
    pub fn from_config(config: &InputValidationConfig) -> Result<Self> {
        let mut validator = Self::new(config.max_input_length, config.max_input_tokens)
            .block_injection(config.block_known_injection_patterns)
            .with_patterns(config.injection_patterns.iter().cloned());

        if let Some(path) = &config.injection_patterns_file {
            validator = validator.with_patterns(load_patterns(path)?);
        }

        Ok(validator)
    }

    /// Add injection patterns; matching is case-insensitive
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(
            patterns
                .into_iter()
                .map(|p| p.into().trim().to_lowercase())
                .filter(|p| !p.is_empty()),
        );
        self
    }

    pub fn block_injection(mut self, enabled: bool) -> Self {
        self.block_injection = enabled;
        self
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check character length, then whitespace-delimited token count
    pub fn validate(&self, text: &str) -> GuardrailResult {
        let length = text.chars().count();
        if length > self.max_length {
            return GuardrailResult::block("max_input_length", "Input exceeds max length")
                .with_detail("length", length)
                .with_detail("max", self.max_length);
        }

        let tokens = text.split_whitespace().count();
        if tokens > self.max_tokens {
            return GuardrailResult::block("max_input_tokens", "Input exceeds max tokens")
                .with_detail("tokens", tokens)
                .with_detail("max", self.max_tokens);
        }

        GuardrailResult::allow("input_length_ok", "Input length within limits")
    }

    /// BLOCK if the lower-cased text contains any injection pattern
    pub fn check_injection(&self, text: &str) -> GuardrailResult {
        if !self.block_injection || self.patterns.is_empty() {
            return GuardrailResult::allow("injection_disabled", "Injection detection disabled");
        }

        let lowered = text.to_lowercase();
        if let Some(pattern) = self.patterns.iter().find(|p| lowered.contains(p.as_str())) {
            return GuardrailResult::block("injection_pattern", "Input matches injection pattern")
                .with_detail("pattern", pattern.as_str());
        }

        GuardrailResult::allow("no_injection", "No injection patterns detected")
    }
}

/// Read injection patterns, one per line; blank lines are skipped
pub fn load_patterns(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| {
        GuardrailError::config(format!(
            "Failed to read injection patterns {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
