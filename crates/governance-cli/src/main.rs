//! Governance CLI
//!
//! Validates governance documents and runs single guardrail checks
//! against them.

mod gate;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use governance_core::{init_logging, LoggingConfig, RequestContext, DEFAULT_CONFIG_PATH};
use governance_guardrails::{Governance, GovernanceConfig, GuardrailAction, GuardrailResult, GuardrailsEngine};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const EXIT_GATE_FAILED: u8 = 1;
const EXIT_BLOCKED: u8 = 2;
const EXIT_CONFIRM: u8 = 3;

/// Governance CLI - guardrail policy tooling
#[derive(Parser, Debug)]
#[command(name = "governance")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and resolve a governance document
    Validate {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,

        /// Also require the metadata and controls needed for deployment
        #[arg(long)]
        deployment_gate: bool,
    },

    /// Run the input pipeline on a piece of text
    CheckInput {
        text: String,

        #[command(flatten)]
        target: Target,
    },

    /// Run the output pipeline on a piece of text
    CheckOutput {
        text: String,

        #[command(flatten)]
        target: Target,
    },

    /// Run the tool call pipeline on one call
    CheckTool {
        name: String,

        /// Tool parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,

        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args, Debug)]
struct Target {
    /// Governance document; built-in strict defaults when absent
    #[arg(long, env = "GOV_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Raw user id the check is attributed to
    #[arg(long)]
    user: Option<String>,

    /// Session id the check is attributed to
    #[arg(long)]
    session: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path, deployment_gate } => {
            let config = GovernanceConfig::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            start_logging(&config.logging, cli.verbose);
            validate(&config, deployment_gate)
        }
        Command::CheckInput { text, target } => {
            run_check(&target, cli.verbose, |engine, ctx| engine.check_input(ctx, &text)).await
        }
        Command::CheckOutput { text, target } => {
            run_check(&target, cli.verbose, |engine, ctx| engine.check_output(ctx, &text)).await
        }
        Command::CheckTool { name, params, target } => {
            let params: serde_json::Value =
                serde_json::from_str(&params).context("--params must be valid JSON")?;
            run_check(&target, cli.verbose, |engine, ctx| {
                engine.check_tool_call(ctx, &name, &params)
            })
            .await
        }
    }
}

fn start_logging(config: &LoggingConfig, verbose: bool) {
    let mut config = config.clone();
    if verbose {
        config.level = "debug".to_string();
    }
    // Only fails when a subscriber is already installed.
    init_logging(&config).ok();
}

fn validate(config: &GovernanceConfig, deployment_gate: bool) -> anyhow::Result<ExitCode> {
    let guardrails = config.guardrails().context("Invalid guardrails policy")?;
    GuardrailsEngine::new(&guardrails).context("Failed to build guardrails engine")?;

    if deployment_gate {
        let problems = gate::deployment_problems(config);
        if !problems.is_empty() {
            println!("Deployment gate failed:\n");
            for problem in &problems {
                println!("- {}", problem);
            }
            return Ok(ExitCode::from(EXIT_GATE_FAILED));
        }
        println!("Deployment gate passed");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Config valid");
    Ok(ExitCode::SUCCESS)
}

async fn run_check<F>(target: &Target, verbose: bool, check: F) -> anyhow::Result<ExitCode>
where
    F: FnOnce(&GuardrailsEngine, &RequestContext) -> GuardrailResult,
{
    let config = load_or_default(&target.config)?;
    start_logging(&config.logging, verbose);

    let governance = Governance::from_config(config)?;
    let ctx = RequestContext::new(target.user.as_deref(), target.session.clone());

    let result = check(governance.engine(), &ctx);
    governance.engine().complete_request(&ctx);
    governance.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(exit_code(&result))
}

fn load_or_default(path: &Path) -> anyhow::Result<GovernanceConfig> {
    if path.exists() {
        return GovernanceConfig::load(path).with_context(|| format!("Failed to load {}", path.display()));
    }
    tracing::debug!("{} not found, using default policy", path.display());
    Ok(GovernanceConfig::default())
}

fn exit_code(result: &GuardrailResult) -> ExitCode {
    match result.action {
        GuardrailAction::Block => ExitCode::from(EXIT_BLOCKED),
        GuardrailAction::Confirm => ExitCode::from(EXIT_CONFIRM),
        _ => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_tool() {
        let cli = Cli::try_parse_from([
            "governance",
            "check-tool",
            "email_user",
            "--params",
            r#"{"to": "a@b.c"}"#,
            "--user",
            "alice",
        ])
        .unwrap();

        match cli.command {
            Command::CheckTool { name, params, target } => {
                assert_eq!(name, "email_user");
                assert_eq!(params, r#"{"to": "a@b.c"}"#);
                assert_eq!(target.user.as_deref(), Some("alice"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validate_defaults_to_governance_yaml() {
        let cli = Cli::try_parse_from(["governance", "validate", "--deployment-gate"]).unwrap();
        match cli.command {
            Command::Validate { path, deployment_gate } => {
                assert_eq!(path, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(deployment_gate);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&GuardrailResult::allow("ok", "ok")), ExitCode::SUCCESS);
        assert_eq!(exit_code(&GuardrailResult::block("b", "b")), ExitCode::from(EXIT_BLOCKED));
        assert_eq!(exit_code(&GuardrailResult::confirm("c", "c")), ExitCode::from(EXIT_CONFIRM));
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let config = GovernanceConfig {
            guardrails: serde_json::json!({"profile": "paranoid"}),
            ..Default::default()
        };
        assert!(validate(&config, false).is_err());
    }
}
