//! Policy Profiles
//!
//! Shows how a raw `guardrails` section is resolved: profile defaults,
//! the legacy rules dialect and serialization of the result.
//!
//! Run with:
//! ```bash
//! cargo run -p governance-guardrails --example policy_profiles
//! ```

use governance_guardrails::*;

const CANONICAL: &str = r#"
profile: balanced
content_safety:
  keyword_blocklist: [project nightingale]
tools:
  policies:
    - tool_name: refund_order
      requires_confirmation: true
      max_calls_per_request: 1
"#;

const RULES: &str = r#"
input_guardrails:
  - type: prompt_injection
  - type: topic_filter
    disallowed_topics: [gambling]
output_guardrails:
  - type: content_safety
action_guardrails:
  - type: tool_authorization
    allowed_tools: [search]
    disallowed_tools: [shell]
rate_limits:
  max_requests_per_minute: 20
"#;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("⚙️  Guardrails Policy Profiles\n");

    println!("=== Profile defaults ===");
    for profile in [
        GuardrailProfile::Strict,
        GuardrailProfile::Balanced,
        GuardrailProfile::Permissive,
    ] {
        let config = normalize(PolicyDocument::from_value(profile.defaults())?)?;
        println!(
            "  {:<10} default tools allowed: {:<5} categories: {} user rpm: {}",
            profile,
            config.tools.default_policy.allowed,
            config.content_safety.block_categories.len(),
            config.rate_limiting.requests_per_minute_per_user,
        );
    }
    println!();

    println!("=== Canonical section over a profile ===");
    let section: serde_json::Value = serde_yaml::from_str(CANONICAL)?;
    let config = resolve(&section)?;
    println!("  keywords: {:?}", config.content_safety.keyword_blocklist);
    println!("  categories: {:?}", config.content_safety.block_categories);
    println!("  policies: {}", config.tools.policies.len());
    println!();

    println!("=== Rules dialect ===");
    let section: serde_json::Value = serde_yaml::from_str(RULES)?;
    let document = PolicyDocument::from_value(section.clone())?;
    println!("  detected format: {:?}", document.format());
    let config = resolve(&section)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    println!("\n✅ Policy profiles demo complete!");

    Ok(())
}
