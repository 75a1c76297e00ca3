//! Deployment gate
//!
//! Checks that a governance document carries the identity and guardrail
//! controls a production deployment needs.

use governance_guardrails::{GovernanceConfig, GuardrailsConfig};

/// Every reason the document may not be deployed; empty means it passes
pub fn deployment_problems(config: &GovernanceConfig) -> Vec<String> {
    let mut problems = Vec::new();

    let agent = &config.agent;
    let required = [
        ("agent_id", &agent.agent_id),
        ("agent_name", &agent.agent_name),
        ("version", &agent.version),
        ("gcp_project", &agent.gcp_project),
        ("region", &agent.region),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            problems.push(format!("agent.{} must be non-empty", field));
        }
    }

    if !has_section(config) {
        problems.push("guardrails section is missing".to_string());
        return problems;
    }

    match config.guardrails() {
        Ok(guardrails) => {
            if !guardrails.enabled {
                problems.push("guardrails.enabled must be true for deployment".to_string());
            }
            if !has_enforceable_control(&guardrails) {
                problems.push("guardrails has no enforceable controls".to_string());
            }
        }
        Err(e) => problems.push(format!("guardrails policy is invalid: {}", e)),
    }

    problems
}

fn has_section(config: &GovernanceConfig) -> bool {
    match config.guardrails.as_object() {
        Some(section) => !section.is_empty(),
        None => false,
    }
}

fn has_enforceable_control(guardrails: &GuardrailsConfig) -> bool {
    guardrails.input_validation.block_known_injection_patterns
        || (guardrails.content_safety.enabled && !guardrails.content_safety.block_categories.is_empty())
        || !guardrails.tools.policies.is_empty()
        || guardrails.rate_limiting.enabled
}

#[cfg(test)]
mod tests {
    use super::*;
    use governance_core::AgentIdentity;
    use serde_json::json;

    fn identity() -> AgentIdentity {
        AgentIdentity {
            agent_id: "support-bot".to_string(),
            agent_name: "Support Bot".to_string(),
            version: "1.0.0".to_string(),
            gcp_project: "acme".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_document_passes() {
        let config = GovernanceConfig {
            agent: identity(),
            guardrails: json!({"profile": "strict"}),
            ..Default::default()
        };
        assert!(deployment_problems(&config).is_empty());
    }

    #[test]
    fn test_missing_identity_and_section() {
        let config = GovernanceConfig::default();
        let problems = deployment_problems(&config);

        assert!(problems.contains(&"agent.agent_id must be non-empty".to_string()));
        assert!(problems.contains(&"agent.gcp_project must be non-empty".to_string()));
        assert!(problems.contains(&"guardrails section is missing".to_string()));
        assert!(!problems.iter().any(|p| p.contains("region")));
    }

    #[test]
    fn test_disabled_guardrails() {
        let config = GovernanceConfig {
            agent: identity(),
            guardrails: json!({"profile": "strict", "enabled": false}),
            ..Default::default()
        };
        assert_eq!(
            deployment_problems(&config),
            vec!["guardrails.enabled must be true for deployment".to_string()]
        );
    }

    #[test]
    fn test_no_enforceable_controls() {
        let config = GovernanceConfig {
            agent: identity(),
            guardrails: json!({
                "profile": "custom",
                "input_validation": {"block_known_injection_patterns": false},
                "rate_limiting": {"enabled": false},
            }),
            ..Default::default()
        };
        assert_eq!(
            deployment_problems(&config),
            vec!["guardrails has no enforceable controls".to_string()]
        );
    }

    #[test]
    fn test_invalid_policy_is_reported() {
        let config = GovernanceConfig {
            agent: identity(),
            guardrails: json!({"profile": "paranoid"}),
            ..Default::default()
        };
        let problems = deployment_problems(&config);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("guardrails policy is invalid"));
    }
}
