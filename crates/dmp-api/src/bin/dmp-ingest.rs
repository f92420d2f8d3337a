//! Command-line front end for the DMP ingestion contracts

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dmp_api::{default_template, standard_schemes, ApiConfig, ApiResponse, ApiService, Caller, RorLookup};
use dmp_ingest::{DmpStore, InMemoryStore, NoopLookup, OrgLookup};
use dmp_model::{OrgId, PlanId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("dmp-ingest")
        .version(dmp_api::VERSION)
        .about("Resolve DMP JSON documents into a deduplicated plan graph")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .env("DMP_CONFIG")
                .value_parser(value_parser!(PathBuf))
                .help("TOML or YAML configuration file"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .env("DMP_STORE")
                .default_value("dmp-store.json")
                .value_parser(value_parser!(PathBuf))
                .help("Snapshot file backing the in-memory store"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("ingest")
                .about("Submit a v1 batch or v2 document from a file")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Request body"),
                )
                .arg(
                    Arg::new("v1")
                        .long("v1")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("update")
                        .help("Treat the body as a v1 batch"),
                )
                .arg(
                    Arg::new("update")
                        .long("update")
                        .value_parser(value_parser!(u64))
                        .help("Update this plan id instead of creating"),
                )
                .arg(caller_arg())
                .arg(caller_org_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Render a stored plan")
                .arg(
                    Arg::new("id")
                        .long("id")
                        .required(true)
                        .value_parser(value_parser!(u64))
                        .help("Plan id"),
                )
                .arg(caller_arg())
                .arg(caller_org_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List the caller organization's plans, newest first")
                .arg(
                    Arg::new("page")
                        .long("page")
                        .value_parser(value_parser!(u32))
                        .help("Page number"),
                )
                .arg(
                    Arg::new("per-page")
                        .long("per-page")
                        .value_parser(value_parser!(u32))
                        .help("Plans per page"),
                )
                .arg(caller_arg())
                .arg(caller_org_arg()),
        )
        .subcommand(Command::new("schemes").about("List registered identifier schemes"))
}

fn caller_arg() -> Arg {
    Arg::new("caller")
        .long("caller")
        .env("DMP_CALLER")
        .default_value("cli")
        .help("Caller name echoed in responses")
}

fn caller_org_arg() -> Arg {
    Arg::new("caller-org")
        .long("caller-org")
        .env("DMP_CALLER_ORG")
        .value_parser(value_parser!(u64))
        .help("Organization id the caller acts for")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dmp_ingest=info,dmp_api=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<ApiConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => ApiConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ApiConfig::default()),
    }
}

fn open_store(path: &Path) -> Result<Arc<InMemoryStore>> {
    if path.exists() {
        let store = InMemoryStore::load_snapshot(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        return Ok(Arc::new(store));
    }
    tracing::info!(path = %path.display(), "no snapshot yet, starting from reference data");
    let store = InMemoryStore::new();
    for scheme in standard_schemes() {
        store.add_scheme(scheme);
    }
    store.add_template(default_template());
    Ok(Arc::new(store))
}

fn caller(args: &ArgMatches) -> Caller {
    let name = args.get_one::<String>("caller").map_or("cli", String::as_str);
    let caller = Caller::new(name);
    match args.get_one::<u64>("caller-org") {
        Some(org) => caller.with_org(OrgId(*org)),
        None => caller,
    }
}

fn print(response: &ApiResponse) -> Result<bool> {
    let body = response.to_json().context("serializing response")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(!response.status.is_error())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = load_config(&matches)?;
    let store_path = matches
        .get_one::<PathBuf>("store")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("dmp-store.json"));
    let store = open_store(&store_path)?;
    let lookup: Arc<dyn OrgLookup> = if config.ror.enabled {
        Arc::new(RorLookup::new(&config.ror))
    } else {
        Arc::new(NoopLookup)
    };
    let service = ApiService::new(store.clone(), lookup, config);

    let succeeded = match matches.subcommand() {
        Some(("ingest", args)) => {
            let Some(file) = args.get_one::<PathBuf>("file") else {
                bail!("--file is required");
            };
            let body = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let caller = caller(args);
            let response = if args.get_flag("v1") {
                service.create_v1(Some(&caller), &body).await
            } else if let Some(id) = args.get_one::<u64>("update") {
                service.update_v2(Some(&caller), PlanId(*id), &body).await
            } else {
                service.create_v2(Some(&caller), &body).await
            };
            store
                .save_snapshot(&store_path)
                .with_context(|| format!("writing snapshot {}", store_path.display()))?;
            print(&response)?
        }
        Some(("show", args)) => {
            let Some(id) = args.get_one::<u64>("id") else {
                bail!("--id is required");
            };
            print(&service.show(Some(&caller(args)), PlanId(*id)).await)?
        }
        Some(("list", args)) => {
            let page = args.get_one::<u32>("page").copied();
            let per_page = args.get_one::<u32>("per-page").copied();
            print(&service.list(Some(&caller(args)), page, per_page).await)?
        }
        Some(("schemes", _)) => {
            for scheme in store.schemes().await? {
                println!(
                    "{:>3}  {:<12} {}",
                    scheme.id.get(),
                    scheme.name,
                    scheme.landing_url().unwrap_or("-")
                );
            }
            true
        }
        _ => {
            cli().print_help()?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
