use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use fruit_engine::{CONFIG_PATH_ENV, DEFAULT_RETURN_CODE, Garden, TargetReport, default_config_path, load_into};
use fruit_types::{CatalogEntry, RunSummary};
use fruit_util::console;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod console_observer;

use console_observer::ConsoleObserver;

fn main() -> ExitCode {
    init_tracing();
    let matches = build_cli().get_matches();
    match run(&matches) {
        Ok(code) => code,
        Err(error) => {
            console::error(format!("{error:#}"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    Command::new("fruit")
        .about("Make targets declared in fruitconfig.yaml")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("collect")
                .about("List the targets and providers of a configuration")
                .arg(
                    Arg::new("path")
                        .value_name("PATH")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(PathBuf))
                        .help(config_help()),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("make")
                .about("Make one or more targets in order")
                .arg(
                    Arg::new("targets")
                        .value_name("TARGET")
                        .required(true)
                        .num_args(1..)
                        .action(ArgAction::Append),
                )
                .arg(config_arg())
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("get")
                .about("Print the result of a provider")
                .arg(Arg::new("name").value_name("NAME").required(true).action(ArgAction::Set))
                .arg(config_arg()),
        )
}

fn config_help() -> String {
    format!("Configuration file or directory [default: ${CONFIG_PATH_ENV} or .]")
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .value_name("PATH")
        .action(ArgAction::Set)
        .value_parser(value_parser!(PathBuf))
        .help(config_help())
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print machine readable JSON")
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    match matches.subcommand() {
        Some(("collect", sub)) => collect(sub),
        Some(("make", sub)) => make(sub),
        Some(("get", sub)) => get(sub),
        _ => anyhow::bail!("expected one of: collect, make, get"),
    }
}

fn config_path(matches: &ArgMatches, id: &str) -> PathBuf {
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_else(default_config_path)
}

fn load_garden(path: &Path) -> Result<Garden> {
    let mut garden = Garden::new();
    let loaded = load_into(&mut garden, path).with_context(|| format!("failed to load configuration from {}", path.display()))?;
    debug!(path = %loaded.path.display(), base_dir = %loaded.base_dir.display(), "configuration ready");
    Ok(garden)
}

fn collect(matches: &ArgMatches) -> Result<ExitCode> {
    let garden = load_garden(&config_path(matches, "path"))?;
    let targets: Vec<CatalogEntry> = garden
        .targets()
        .map(|target| CatalogEntry {
            name: target.name().to_string(),
            description: target.description().to_string(),
        })
        .collect();
    let providers: Vec<CatalogEntry> = garden
        .providers()
        .map(|provider| CatalogEntry {
            name: provider.name().to_string(),
            description: provider.description().to_string(),
        })
        .collect();

    if matches.get_flag("json") {
        let catalog = serde_json::json!({ "targets": targets, "providers": providers });
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        console::echo(render_catalog(&targets, &providers));
    }
    Ok(ExitCode::SUCCESS)
}

fn render_catalog(targets: &[CatalogEntry], providers: &[CatalogEntry]) -> String {
    let rows = |entries: &[CatalogEntry]| -> Vec<Vec<String>> {
        entries
            .iter()
            .map(|entry| vec![entry.name.clone(), entry.description.clone()])
            .collect()
    };
    let mut out = console::render_table(&["Target", "Description"], &rows(targets));
    out.push_str("\n\nList of providers:\n");
    if providers.is_empty() {
        out.push_str("\tNo providers found!");
    } else {
        out.push_str(&console::render_table(&["Provider", "Description"], &rows(providers)));
    }
    out
}

fn make(matches: &ArgMatches) -> Result<ExitCode> {
    let names: Vec<String> = matches.get_many::<String>("targets").into_iter().flatten().cloned().collect();
    let json = matches.get_flag("json");
    let mut garden = load_garden(&config_path(matches, "config"))?;
    if !json {
        garden.set_observer(ConsoleObserver::new(console::terminal_width()));
    }

    let reports = garden.make_multiple(&names)?;
    if json {
        let summaries: Vec<RunSummary> = reports.iter().map(TargetReport::summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }
    let all_succeeded = reports.iter().all(TargetReport::succeeded);
    Ok(exit_code(batch_return_code(garden.return_code(), all_succeeded)))
}

/// The garden resets its code for every target, so an earlier failure in the
/// batch must not be hidden by a later success.
fn batch_return_code(last: i32, all_succeeded: bool) -> i32 {
    if last == 0 && !all_succeeded { DEFAULT_RETURN_CODE } else { last }
}

fn get(matches: &ArgMatches) -> Result<ExitCode> {
    let name = matches.get_one::<String>("name").context("missing provider name")?;
    let garden = load_garden(&config_path(matches, "config"))?;
    console::echo(garden.run_provider(name)?);
    Ok(ExitCode::SUCCESS)
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}
