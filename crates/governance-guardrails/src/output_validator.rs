//! Output length limits

use crate::config::OutputValidationConfig;
use crate::GuardrailResult;

/// Validates model output before it reaches the user
#[derive(Debug, Clone)]
pub struct OutputValidator {
    max_length: usize,
}

impl OutputValidator {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn from_config(config: &OutputValidationConfig) -> Self {
        Self::new(config.max_output_length)
    }

    /// BLOCK if the output is longer than the limit, in characters
    pub fn validate(&self, text: &str) -> GuardrailResult {
        let length = text.chars().count();
        if length > self.max_length {
            return GuardrailResult::block("max_output_length", "Output exceeds max length")
                .with_detail("length", length)
                .with_detail("max", self.max_length);
        }

        GuardrailResult::allow("output_length_ok", "Output length within limits")
    }
}
