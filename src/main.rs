//! PV simulator entry point: CLI wiring and config-driven pipeline construction.

use std::path::Path;
use std::process;

use pv_sim::config::ScenarioConfig;
use pv_sim::io::export::export_csv;
use pv_sim::logging;
use pv_sim::sim::kpi::TrackingReport;
use pv_sim::sim::pipeline::Pipeline;
use pv_sim::source::{CellModelKind, LookupParams, LookupTable};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    cycles_override: Option<usize>,
    telemetry_out: Option<String>,
    build_lookup: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("pv-sim - PV power chain and MPPT simulator");
    eprintln!();
    eprintln!("Usage: pv-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --cycles <n>             Override the last cycle of the run");
    eprintln!("  --telemetry-out <path>   Export cycle records to CSV");
    eprintln!("  --build-lookup <path>    Write a lookup table for the scenario's cell model and exit");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after simulation");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

/// Returns the value following flag `args[*i]`, exiting if it is missing.
fn flag_value<'a>(args: &'a [String], i: &mut usize, what: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            eprintln!("error: {} requires {what}", args[*i - 1]);
            process::exit(1);
        }
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str, kind: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("error: {flag} value \"{value}\" is not a valid {kind}");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        cycles_override: None,
        telemetry_out: None,
        build_lookup: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                cli.scenario_path = Some(flag_value(&args, &mut i, "a path argument").to_string());
            }
            "--preset" => {
                cli.preset = Some(flag_value(&args, &mut i, "a name argument").to_string());
            }
            "--seed" => {
                let v = flag_value(&args, &mut i, "a u64 argument");
                cli.seed_override = Some(parse_number("--seed", v, "u64"));
            }
            "--cycles" => {
                let v = flag_value(&args, &mut i, "a cycle count");
                cli.cycles_override = Some(parse_number("--cycles", v, "cycle count"));
            }
            "--telemetry-out" => {
                cli.telemetry_out = Some(flag_value(&args, &mut i, "a path argument").to_string());
            }
            "--build-lookup" => {
                cli.build_lookup = Some(flag_value(&args, &mut i, "a path argument").to_string());
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                let v = flag_value(&args, &mut i, "a u16 argument");
                cli.port = parse_number("--port", v, "u16");
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn load_scenario(cli: &CliArgs) -> ScenarioConfig {
    // --scenario takes priority, then --preset, then baseline default
    let loaded = if let Some(ref path) = cli.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::baseline())
    };
    let mut scenario = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }
    if let Some(cycles) = cli.cycles_override {
        scenario.simulation.max_cycles = cycles;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    scenario
}

fn build_lookup(scenario: &ScenarioConfig, path: &str) {
    let model = scenario
        .source
        .model
        .parse::<CellModelKind>()
        .unwrap_or_else(|e| {
            eprintln!("{e}");
            process::exit(1);
        });
    let table = LookupTable::build(model, LookupParams::default());
    if let Err(e) = table.export_csv(Path::new(path)) {
        eprintln!("error: failed to write lookup table: {e}");
        process::exit(1);
    }
    eprintln!("Lookup table ({} rows) written to {path}", table.len());
}

fn main() {
    logging::init();
    let cli = parse_args();
    let scenario = load_scenario(&cli);

    if let Some(ref path) = cli.build_lookup {
        build_lookup(&scenario, path);
        return;
    }

    let mut pipeline = Pipeline::from_config(&scenario).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let records = pipeline.run().unwrap_or_else(|e| {
        eprintln!("error: run aborted: {e}");
        process::exit(1);
    });

    for r in records {
        println!("{r}");
    }

    let report = TrackingReport::from_records(records);
    println!("\n{report}");

    if let Some(ref path) = cli.telemetry_out {
        if let Err(e) = export_csv(records, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {path}");
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(pv_sim::api::AppState::from_pipeline(&pipeline));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(pv_sim::api::serve(state, addr)) {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
