use clap::Parser;
use clap_derive::Parser;

use std::path::PathBuf;
use std::sync::Arc;

use benchmark_models::config::Config;
use benchmark_models::console::Console;
use benchmark_models::environment;
use benchmark_models::error::Result;
use benchmark_models::logger::{Log, StdoutLog};
use benchmark_models::report::{update_perf_csv, ReportUpdate};

/// Arguments
/// `--single-result` - JSON artifact of one finished run
/// `--exception-result` - JSON artifact of one run that raised
/// `--multiple-results` - CSV artifact holding one row per model
/// `--common-info` - JSON fields shared by every row of a multi-result batch
/// `--model-name` - prefix namespacing each multi-result row's model
/// `--perf-csv` - report file to update
/// `--system-info` - probe and log the host facts instead of updating
#[derive(Parser)]
#[clap(name = "Benchmark Models")]
struct Args {
    #[arg(long)]
    single_result: Option<PathBuf>,
    #[arg(long)]
    exception_result: Option<PathBuf>,
    #[arg(long)]
    failed_result: Option<PathBuf>,
    #[arg(long)]
    multiple_results: Option<PathBuf>,
    #[arg(long)]
    perf_csv: Option<PathBuf>,
    #[arg(long)]
    model_name: Option<String>,
    #[arg(long)]
    common_info: Option<PathBuf>,
    #[arg(long)]
    system_info: bool,
}

fn main() {
    let args = Args::parse();
    let log: Log = Arc::new(StdoutLog);

    if let Err(err) = run(&args, log) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args, log: Log) -> Result<()> {
    if args.system_info {
        return print_system_info(log);
    }

    let config = Config::default();
    let perf_csv = args
        .perf_csv
        .clone()
        .unwrap_or_else(|| PathBuf::from(config.perf_csv_path));

    let update = ReportUpdate {
        single_result: args.single_result.clone(),
        exception_result: args.exception_result.clone(),
        failed_result: args.failed_result.clone(),
        multiple_results: args.multiple_results.clone(),
        model_name: args.model_name.clone(),
        common_info: args.common_info.clone(),
    };
    update_perf_csv(&update, &perf_csv, log.as_ref())
}

/// Probe the host and log every fact the harness can discover. The probes
/// log their findings themselves.
fn print_system_info(log: Log) -> Result<()> {
    let console = Console::new(log.clone());
    let sink = log.as_ref();

    let vendor = environment::gpu_vendor(sink)?;
    log.info(&format!("GPU vendor: {}", vendor.as_str()));
    environment::system_gpu_arch(&console, sink)?;
    environment::system_gpus(&console, sink)?;
    environment::system_cpus(sink);
    let host_os = environment::host_os(sink)?;
    environment::host_name(&console, sink)?;
    log.info(&format!(
        "Dockerfile suffix: {}{}",
        vendor.dockerfile_suffix(),
        host_os.dockerfile_suffix()
    ));
    environment::gpu_docker_args(sink)?;
    environment::cpu_docker_args(None, sink);
    if let Some(nodes) = environment::gpu_renderd_nodes(sink)? {
        log.info(&format!("GPU renderD nodes: {:?}", nodes));
    }
    Ok(())
}
