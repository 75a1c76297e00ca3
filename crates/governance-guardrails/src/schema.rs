//! JSON Schema validation of model input, output and tool parameters

use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::{GuardrailError, Result};

/// Validates payloads against configured schemas
///
/// Each method returns the validation error messages; an empty list means
/// the payload is valid. `Err` means validation itself could not run and
/// makes the engine fail closed. Input and output arrive as the raw model
/// text; a validator with a schema for that surface parses it as JSON.
pub trait PayloadValidator: Send + Sync {
    fn validate_input(&self, text: &str) -> Result<Vec<String>>;

    fn validate_output(&self, text: &str) -> Result<Vec<String>>;

    fn validate_tool_params(&self, tool_name: &str, payload: &Value) -> Result<Vec<String>>;
}

/// Schemas loaded from a YAML document:
///
/// ```yaml
/// input_schema: { ... }
/// output_schema: { ... }
/// tool_params:
///   search:
///     schema: { ... }
///   lookup: { ... }
/// ```
///
/// A surface without a schema accepts every payload.
#[derive(Default)]
pub struct ModelSchemaValidator {
    input: Option<Validator>,
    output: Option<Validator>,
    tools: HashMap<String, Validator>,
}

impl ModelSchemaValidator {
    /// Validator with no schemas
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and compile the schemas in a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            GuardrailError::schema(format!("Failed to read schema file {}: {}", path.display(), e))
        })?;
        let document: Value = serde_yaml::from_str(&text)?;
        Self::from_document(&document)
    }

    /// Compile the schemas of an already parsed document
    pub fn from_document(document: &Value) -> Result<Self> {
        let mut tools = HashMap::new();
        if let Some(specs) = document.get("tool_params").and_then(Value::as_object) {
            for (tool_name, spec) in specs {
                let schema = spec.get("schema").unwrap_or(spec);
                if let Some(validator) = compile(schema, &format!("tool_params.{}", tool_name))? {
                    tools.insert(tool_name.clone(), validator);
                }
            }
        }

        Ok(Self {
            input: compile_field(document, "input_schema")?,
            output: compile_field(document, "output_schema")?,
            tools,
        })
    }

    pub fn has_input_schema(&self) -> bool {
        self.input.is_some()
    }

    pub fn has_output_schema(&self) -> bool {
        self.output.is_some()
    }

    pub fn has_tool_schema(&self, tool_name: &str) -> bool {
        self.tools.contains_key(tool_name)
    }
}

fn compile_field(document: &Value, field: &str) -> Result<Option<Validator>> {
    match document.get(field) {
        Some(schema) => compile(schema, field),
        None => Ok(None),
    }
}

fn compile(schema: &Value, label: &str) -> Result<Option<Validator>> {
    let is_empty = match schema {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if is_empty {
        return Ok(None);
    }

    jsonschema::validator_for(schema)
        .map(Some)
        .map_err(|e| GuardrailError::schema(format!("Invalid schema for {}: {}", label, e)))
}

/// Parse `text` as JSON and validate it; text that is not JSON fails
/// with a single parse error. Without a schema any text passes.
fn collect_text_errors(validator: Option<&Validator>, text: &str) -> Vec<String> {
    let Some(validator) = validator else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(text) {
        Ok(payload) => collect_errors(Some(validator), &payload),
        Err(e) => vec![format!("invalid JSON: {}", e)],
    }
}

fn collect_errors(validator: Option<&Validator>, payload: &Value) -> Vec<String> {
    validator
        .map(|validator| validator.iter_errors(payload).map(|e| e.to_string()).collect())
        .unwrap_or_default()
}

impl PayloadValidator for ModelSchemaValidator {
    fn validate_input(&self, text: &str) -> Result<Vec<String>> {
        Ok(collect_text_errors(self.input.as_ref(), text))
    }

    fn validate_output(&self, text: &str) -> Result<Vec<String>> {
        Ok(collect_text_errors(self.output.as_ref(), text))
    }

    fn validate_tool_params(&self, tool_name: &str, payload: &Value) -> Result<Vec<String>> {
        Ok(collect_errors(self.tools.get(tool_name), payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn document() -> Value {
        json!({
            "input_schema": {
                "type": "object",
                "properties": {"text": {"type": "string", "maxLength": 20}},
                "required": ["text"],
            },
            "tool_params": {
                "search": {
                    "schema": {
                        "type": "object",
                        "properties": {"query": {"type": "string"}},
                        "required": ["query"],
                    }
                },
                "lookup": {"type": "object", "required": ["id"]},
                "noop": {},
            },
        })
    }

    #[test]
    fn test_input_schema() {
        let validator = ModelSchemaValidator::from_document(&document()).unwrap();

        assert!(validator.validate_input(r#"{"text": "short"}"#).unwrap().is_empty());

        let errors = validator.validate_input(r#"{"text": "this text is far too long"}"#).unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unparseable_text_fails_schema() {
        let validator = ModelSchemaValidator::from_document(&document()).unwrap();

        let errors = validator.validate_input("plain prose, not JSON").unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("invalid JSON"));
    }

    #[test]
    fn test_missing_surface_accepts_everything() {
        let validator = ModelSchemaValidator::from_document(&document()).unwrap();

        assert!(!validator.has_output_schema());
        assert!(validator.validate_output("not json at all").unwrap().is_empty());
        assert!(validator.validate_tool_params("unknown", &json!(null)).unwrap().is_empty());
    }

    #[test]
    fn test_tool_params_schema() {
        let validator = ModelSchemaValidator::from_document(&document()).unwrap();

        assert!(validator.has_tool_schema("search"));
        assert!(validator.has_tool_schema("lookup"));
        assert!(!validator.has_tool_schema("noop"));

        assert!(validator.validate_tool_params("search", &json!({"query": "rust"})).unwrap().is_empty());
        assert!(!validator.validate_tool_params("search", &json!({})).unwrap().is_empty());
        assert!(!validator.validate_tool_params("lookup", &json!({"name": "x"})).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let err = ModelSchemaValidator::from_document(&json!({"input_schema": {"type": 12}}))
            .err()
            .unwrap();
        assert!(matches!(err, GuardrailError::Schema(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "output_schema:\n  type: object\n  properties:\n    text:\n      type: string\n      pattern: \"^[^<]*$\"\n"
        )
        .unwrap();

        let validator = ModelSchemaValidator::from_file(file.path()).unwrap();
        assert!(validator.validate_output(r#"{"text": "plain"}"#).unwrap().is_empty());
        assert!(!validator.validate_output(r#"{"text": "<script>"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(ModelSchemaValidator::from_file(Path::new("/nonexistent/schemas.yaml")).is_err());
    }
}
