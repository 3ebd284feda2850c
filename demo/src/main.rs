//! veritas Reference Lab — Demo CLI
//!
//! Runs the reference lab scenarios, or a single query given on the command
//! line, against the fictional nautobot lab.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- inventory-query
//!   cargo run -p demo -- query --select hostname --using nb.devices --where 'name__ic=local'
//!   cargo run -p demo -- query --select 'd.hostname, v.vid' --using 'nb.devices as d' \
//!       --join 'nb.vlans as v' --on 'd.id = v.interfaces_as_tagged[0].device.id'

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use veritas_contracts::{error::VeritasResult, query::QueryDescriptor};
use veritas_core::Executor;
use veritas_ref_nautobot::{
    fixtures, lab_executor,
    scenarios::{address_owner, inventory_query, prefix_lookup, vlan_join},
};
use veritas_schema::{ConfigLocator, SotConfig};

// ── CLI definition ────────────────────────────────────────────────────────────

/// veritas: SQL-flavoured queries over a network source of truth.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "veritas reference lab demo",
    long_about = "Runs veritas queries against a fictional nautobot lab: filter parsing,\n\
                  field projection, joins, GraphQL translation and transforms."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four lab scenarios in sequence.
    RunAll,
    /// Scenario 1: Inventory Query (name search, custom fields, paging).
    InventoryQuery,
    /// Scenario 2: Prefix Lookup (within_include, GraphQL rendering).
    PrefixLookup,
    /// Scenario 3: VLAN Join (devices joined to tagged VLANs).
    VlanJoin,
    /// Scenario 4: Address Owner (ipaddress_to_device).
    AddressOwner,
    /// Run one query and print the result as JSON.
    Query(QueryArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Comma-separated fields to select.
    #[arg(long)]
    select: String,
    /// Primary endpoint: `namespace.table[ as alias]`.
    #[arg(long)]
    using: String,
    /// Endpoint to join: `namespace.table[ as alias]`.
    #[arg(long, requires = "on")]
    join: Option<String>,
    /// Join correlation: `leftAlias.path = rightAlias.path`.
    #[arg(long, requires = "join")]
    on: Option<String>,
    /// Filter expression.
    #[arg(long = "where", default_value = "")]
    filter: String,
    /// Transform to apply; repeat or comma-separate for several.
    #[arg(long)]
    transform: Vec<String>,
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long)]
    offset: Option<usize>,
    /// Print the GraphQL requests instead of running them.
    #[arg(long)]
    explain: bool,
    /// Config file. Without it, `veritas.toml` is looked up in the usual
    /// places and the lab defaults apply when none exists.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let config = match &cli.command {
        Command::Query(args) => load_config(args.config.as_ref()),
        _ => Ok(None),
    };

    // RUST_LOG wins over the configured level. Set RUST_LOG=debug for verbose output.
    let level = match &config {
        Ok(Some(config)) => config.logging.level.clone(),
        _ => None,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_deref().unwrap_or("warn"))),
        )
        .with_target(false)
        .compact()
        .init();

    let result = config.and_then(|config| match cli.command {
        Command::RunAll => run_all(),
        Command::InventoryQuery => inventory_query::run_scenario(),
        Command::PrefixLookup => prefix_lookup::run_scenario(),
        Command::VlanJoin => vlan_join::run_scenario(),
        Command::AddressOwner => address_owner::run_scenario(),
        Command::Query(args) => run_query(args, config),
    });

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> VeritasResult<()> {
    print_banner();
    inventory_query::run_scenario()?;
    prefix_lookup::run_scenario()?;
    vlan_join::run_scenario()?;
    address_owner::run_scenario()?;
    println!("All scenarios completed successfully.");
    Ok(())
}

// ── Ad-hoc query ──────────────────────────────────────────────────────────────

fn load_config(explicit: Option<&PathBuf>) -> VeritasResult<Option<SotConfig>> {
    if let Some(path) = explicit {
        return SotConfig::load(path).map(Some);
    }
    let locator = ConfigLocator::new("veritas", ".");
    match locator.locate() {
        Some(_) => locator.load().map(Some),
        None => Ok(None),
    }
}

fn executor_for(config: Option<SotConfig>) -> VeritasResult<Executor> {
    let registry = match config {
        Some(config) => {
            if let Some(nautobot) = &config.nautobot {
                warn!(url = %nautobot.url, "the demo answers from lab fixtures, not from nautobot");
            }
            config.registry()?
        }
        None => fixtures::lab_registry()?,
    };
    let (executor, _) = lab_executor(registry);
    Ok(executor)
}

fn descriptor(args: QueryArgs) -> QueryDescriptor {
    let mut descriptor = QueryDescriptor::new(args.select.as_str())
        .with_using(args.using)
        .with_filter(args.filter)
        .with_transforms(args.transform);
    if let (Some(join), Some(on)) = (args.join, args.on) {
        descriptor = descriptor.with_join(join).with_on(on);
    }
    if let Some(limit) = args.limit {
        descriptor = descriptor.with_limit(limit);
    }
    if let Some(offset) = args.offset {
        descriptor = descriptor.with_offset(offset);
    }
    descriptor
}

fn run_query(args: QueryArgs, config: Option<SotConfig>) -> VeritasResult<()> {
    let executor = executor_for(config)?;
    let explain = args.explain;
    let descriptor = descriptor(args);
    info!(select = ?descriptor.select, using = ?descriptor.using, "running query");

    if explain {
        for query in executor.explain(&descriptor)? {
            println!("{}", query.query);
            println!("{:#}", Value::Object(query.variables));
        }
        return Ok(());
    }

    let rows = executor.execute(&descriptor)?;
    println!("{:#}", Value::Array(rows));
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("veritas: source-of-truth query layer");
    println!("Reference Lab Demo");
    println!("====================================");
    println!();
    println!("Query pipeline:");
    println!("  [1] Endpoint resolution: 'nb.devices as d' against the schema registry");
    println!("  [2] Projection: selected fields checked and mapped to response keys");
    println!("  [3] Filter: parsed, bound to field types, 'or' over one filter condensed");
    println!("  [4] Join planning, transform names checked; nothing fetched before this");
    println!("  [5] Fetch, combine, transform");
    println!();
}
