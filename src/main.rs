use anyhow::Context;
use clap::Parser;
use colored::Colorize;

use nft_offloading_sim::domain::statistics::simulation_summary::SimulationSummary;
use nft_offloading_sim::domain::statistics::task_record_collector::TaskRecordCollector;
use nft_offloading_sim::generate_simulation;

#[derive(Parser)]
#[command(author, version, about = "Reservation-based compute offloading between vehicles and edge solvers", long_about = None)]
struct Args {
    /// JSON scenario file
    #[arg(short, long)]
    config: String,

    /// Number of ticks to simulate, overrides the scenario
    #[arg(short, long)]
    ticks: Option<u64>,

    /// CSV file receiving one row per finished task
    #[arg(short, long)]
    records: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut simulation = generate_simulation(&args.config).with_context(|| format!("Failed to build simulation from '{}'", args.config))?;

    if let Some(path) = &args.records {
        let collector = TaskRecordCollector::init(Some(path.clone())).with_context(|| format!("Failed to open record file '{}'", path))?;
        simulation.set_collector(collector);
    }

    let summary = simulation.run(args.ticks).context("Simulation aborted")?;
    simulation.shutdown_collector();

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &SimulationSummary) {
    println!("{}", "Simulation summary".bold());
    println!("  generated:              {}", summary.generated);
    println!("  solved:                 {}", summary.solved.to_string().green());
    println!("  timed out:              {}", summary.timed_out.to_string().yellow());
    println!("  failed to find solver:  {}", summary.failed_to_find_solver.to_string().red());
    println!("  processing failed:      {}", summary.processing_failed.to_string().red());
    println!("  still in flight:        {}", summary.in_flight());

    match summary.mean_total_time() {
        Some(mean) => println!("  mean total time:        {:.3} s", mean),
        None => println!("  mean total time:        {}", "n/a".dimmed()),
    }
}
