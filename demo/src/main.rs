//! opsgate Reference Runtime Demo CLI
//!
//! Runs the IT operations demo scenarios, or plans a single request against
//! a catalog and policy of your choosing.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- scenario production-stop
//!   cargo run -p demo -- plan "Restart nginx on web-01"
//!   cargo run -p demo -- plan "Show me all assets" --backend-url http://localhost:8080/v1/reason \
//!       --catalog catalog.toml --policy policy.toml --audit-file audit.jsonl

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use opsgate_audit::{read_log, verify_chain, InMemoryAuditWriter, JsonlAuditWriter};
use opsgate_backend::{HttpBackendConfig, HttpReasoningBackend};
use opsgate_contracts::{
    decision::RequestContext,
    error::{OpsgateError, OpsgateResult},
};
use opsgate_core::{
    traits::{AuditWriter, PolicyEngine, ReasoningBackend},
    Pipeline, PipelineConfig, PipelineOutcome,
};
use opsgate_policy::TieredPolicyEngine;
use opsgate_ref_ops::{
    mock_data::{scripted_backend, MockInventory, CATALOG, POLICY},
    report::{print_audit, print_error, print_outcome},
    scenarios,
};
use opsgate_registry::ToolRegistry;
use opsgate_verify::SchemaVerifier;

// ── CLI definition ────────────────────────────────────────────────────────────

/// opsgate: operational requests in, audited execution plans out.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "opsgate reference runtime demo",
    long_about = "Runs opsgate demo scenarios showing classification, tool selection,\n\
                  execution policy, plan safety, and audit chain integrity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every reference scenario in sequence.
    RunAll,
    /// Run one reference scenario by name.
    Scenario {
        /// asset-inventory, production-stop, ambiguous-request,
        /// backend-failures, service-restart, fleet-script, cyclic-catalog
        name: String,
    },
    /// Plan one request.
    Plan(PlanArgs),
}

#[derive(clap::Args)]
struct PlanArgs {
    /// The request text.
    text: String,
    /// Tool catalog TOML. Defaults to the reference catalog.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Execution policy TOML. Defaults to the reference policy.
    #[arg(long)]
    policy: Option<PathBuf>,
    /// Pipeline tuning TOML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reasoning backend endpoint. Falls back to OPSGATE_BACKEND_URL, then
    /// to the scripted reference backend.
    #[arg(long)]
    backend_url: Option<String>,
    /// Append the audit trail to this JSONL file instead of keeping it in
    /// memory.
    #[arg(long)]
    audit_file: Option<PathBuf>,
    /// Who is asking.
    #[arg(long)]
    requester: Option<String>,
    /// Environment to assume when the text names none.
    #[arg(long)]
    environment: Option<String>,
    /// Resolve OS-family targets against the reference five-host estate.
    #[arg(long)]
    mock_inventory: bool,
    /// Print the plan as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunAll => {
            print_banner();
            run_all().await
        }
        Command::Scenario { name } => {
            print_banner();
            scenarios::run(&name).await
        }
        Command::Plan(args) => plan(args).await,
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all() -> OpsgateResult<()> {
    for name in scenarios::ALL {
        scenarios::run(name).await?;
    }
    println!("All scenarios completed successfully.");
    Ok(())
}

// ── Single request ────────────────────────────────────────────────────────────

fn read_or(path: Option<&PathBuf>, fallback: &str) -> OpsgateResult<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| OpsgateError::ConfigError {
            reason: format!("failed to read '{}': {}", path.display(), e),
        }),
        None => Ok(fallback.to_string()),
    }
}

fn backend(url: Option<String>) -> OpsgateResult<Arc<dyn ReasoningBackend>> {
    let config = match url {
        Some(url) => Some(HttpBackendConfig::new(url)),
        None => HttpBackendConfig::from_env().ok(),
    };
    let backend: Arc<dyn ReasoningBackend> = match config {
        Some(config) => {
            info!(endpoint = %config.endpoint, "using HTTP reasoning backend");
            Arc::new(HttpReasoningBackend::new(config)?)
        }
        None => {
            info!("no backend endpoint configured, using the scripted reference backend");
            Arc::new(scripted_backend())
        }
    };
    Ok(backend)
}

async fn plan(args: PlanArgs) -> OpsgateResult<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let registry = Arc::new(ToolRegistry::from_toml_str(&read_or(args.catalog.as_ref(), CATALOG)?)?);
    let policy: Arc<dyn PolicyEngine> =
        Arc::new(TieredPolicyEngine::from_toml_str(&read_or(args.policy.as_ref(), POLICY)?)?);
    let backend = backend(args.backend_url.clone())?;

    let memory = Arc::new(InMemoryAuditWriter::new());
    let audit: Arc<dyn AuditWriter> = match &args.audit_file {
        Some(path) => Arc::new(JsonlAuditWriter::open(path)?),
        None => memory.clone(),
    };

    let mut pipeline =
        Pipeline::new(&config, registry, backend, Arc::new(SchemaVerifier::new()), policy, audit);
    if args.mock_inventory {
        pipeline = pipeline.with_inventory(Arc::new(MockInventory));
    }

    let context = RequestContext {
        requester: args.requester.clone(),
        default_environment: args.environment.clone(),
        ..Default::default()
    };

    println!("  Request:                \"{}\"", args.text);
    match pipeline.run(&args.text, &context).await {
        Ok(PipelineOutcome::Planned(plan)) if args.json => {
            let json = serde_json::to_string_pretty(&plan)
                .map_err(|e| OpsgateError::Validation { reason: format!("failed to serialize plan: {e}") })?;
            println!("{json}");
        }
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => {
            print_error(&e);
            return Err(e);
        }
    }

    match &args.audit_file {
        Some(path) => {
            let events = read_log(path)?;
            println!(
                "  Audit chain integrity:  {} ({} event(s) in {})",
                if verify_chain(&events) { "VERIFIED" } else { "FAILED" },
                events.len(),
                path.display()
            );
        }
        None => print_audit(&memory),
    }
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("opsgate: Operational Request Gateway");
    println!("IT Operations Reference Demo");
    println!("====================================");
    println!();
    println!("Pipeline per request:");
    println!("  [A] Classifier: text -> Decision (intent, entities, confidence, risk)");
    println!("  [B] Selector:   Decision -> Selection (tools, execution policy, inputs)");
    println!("  [C] Planner:    Selection -> Plan (ordered steps, checks, rollbacks)");
    println!("  Every backend answer is verified; every artifact lands in a SHA-256 chain.");
    println!();
}
