//! BalerDB TPC-C driver binary.
//!
//! `baler-bench run <num_warehouses> <memory_budget_gb> <runtime_minutes>
//! [mode]` loads the dataset, fits the compression models, and either
//! runs the transaction mix (mode 0) or dumps the big relations to CSV
//! (mode 1).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use baler_bench::client::TpccClient;
use baler_bench::clock::Clock;
use baler_bench::csv;
use baler_bench::generator::{CUSTOMERS_STANDARD, TpccGenerator};
use baler_bench::random::{Corpus, NuRandC, TpccRandom};
use baler_core::accountant::RelationId;
use baler_core::db::TpccTables;
use baler_core::types::{MAX_WAREHOUSES, NUM_ITEMS, TablesConfig};
use clap::{Parser, Subcommand};
use tracing::info;

/// Progress is reported every this many transactions.
const TXNS_INTERVAL: u64 = 10_000;

#[derive(Parser, Debug)]
#[command(name = "baler-bench", version, about = "TPC-C under a memory budget")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load warehouses and run the benchmark (mode 0) or dump CSV (mode 1).
    Run {
        /// Number of warehouses to load, 1..=1000.
        num_warehouses: i64,
        /// Memory budget in GB for the compressible relations; 0 spills
        /// everything, `inf` never spills.
        memory_budget_gb: f64,
        /// How long to run the transaction mix.
        runtime_minutes: u64,
        /// 0 = benchmark (default), 1 = dump CSV and exit.
        mode: Option<u8>,
        /// Seed for data generation and model fitting.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Directory with corpus word lists (stock_data.txt, ...).
        #[arg(long)]
        corpus_dir: Option<PathBuf>,
        /// Where scratch/model/CSV files go.
        #[arg(long, default_value = "baler-data")]
        data_dir: PathBuf,
    },
}

fn budget_bytes(gb: f64) -> Option<u64> {
    if gb.is_nan() || gb < 0.0 {
        return None;
    }
    if gb.is_infinite() {
        return Some(u64::MAX);
    }
    Some((gb * (1u64 << 30) as f64) as u64)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Command::Run { num_warehouses, memory_budget_gb, runtime_minutes, mode, seed, corpus_dir, data_dir } =
        cli.command;

    if !(1..=MAX_WAREHOUSES as i64).contains(&num_warehouses) {
        eprintln!("number of warehouses must be in 1..={MAX_WAREHOUSES} (was {num_warehouses})");
        return ExitCode::FAILURE;
    }
    let Some(budget) = budget_bytes(memory_budget_gb) else {
        eprintln!("memory budget must be a non-negative number of GB (was {memory_budget_gb})");
        return ExitCode::FAILURE;
    };
    let mode = mode.unwrap_or(0);
    if mode > 1 {
        eprintln!("mode must be 0 (benchmark) or 1 (CSV dump), was {mode}");
        return ExitCode::FAILURE;
    }
    let num_warehouses = num_warehouses as i32;

    match run(num_warehouses, budget, runtime_minutes, mode, seed, corpus_dir, data_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    num_warehouses: i32,
    budget: u64,
    runtime_minutes: u64,
    mode: u8,
    seed: u64,
    corpus_dir: Option<PathBuf>,
    data_dir: PathBuf,
) -> baler_core::error::Result<()> {
    let mut config = TablesConfig::new(budget, &data_dir);
    config.fitter_seed = seed;
    let mut tables = TpccTables::new(config)?;

    let corpus = Corpus::load(corpus_dir.as_deref());
    let mut random = TpccRandom::new(seed, corpus.clone());
    let c_load = NuRandC::make_random(&mut random);
    random.set_c(c_load);

    // Load.
    info!(num_warehouses, budget, "loading");
    let now = Clock::now_string();
    let started = Instant::now();
    let mut generator = TpccGenerator::standard(random, &now);
    generator.make_items_table(&mut tables);
    for w_id in 1..=num_warehouses {
        generator.make_warehouse(&mut tables, w_id)?;
    }
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "load finished");

    // Learn models and convert the growing relations.
    let started = Instant::now();
    tables.mount_compressed(num_warehouses)?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "models fitted and mounted");

    if mode == 1 {
        csv::dump_all(&mut tables, &data_dir)?;
        return Ok(());
    }

    // Fresh run-time NURand constants, TPC-C 2.1.6.1.
    let mut run_random = TpccRandom::new(seed.wrapping_add(1), corpus);
    let c_run = NuRandC::make_random_for_run(&mut run_random, &c_load);
    run_random.set_c(c_run);

    let mut client = TpccClient::new(
        run_random,
        NUM_ITEMS,
        num_warehouses,
        10,
        CUSTOMERS_STANDARD,
    );

    println!("txns\ttxn/s\tmem\tdisk\tmodel\ttree");
    let deadline = Duration::from_secs(runtime_minutes * 60);
    let mut busy = Duration::ZERO;
    let mut interval = Duration::ZERO;
    let mut executed: u64 = 0;
    while busy < deadline {
        interval += client.do_one(&mut tables)?;
        executed += 1;

        if executed % TXNS_INTERVAL == 0 {
            busy += interval;
            let throughput = TXNS_INTERVAL as f64 / interval.as_secs_f64();
            let acct = tables.accountant();
            println!(
                "{executed}\t{throughput:.1}\t{}\t{}\t{}\t{}",
                acct.in_mem_total(),
                acct.disk_total(),
                acct.model_footprint(),
                tables.tree_size(),
            );
            interval = Duration::ZERO;
        }
    }

    let throughput = executed as f64 / busy.as_secs_f64();
    println!("{executed} transactions in {} ms = {throughput:.1} txn/s", busy.as_millis());
    print_breakdown(&tables, &client);
    Ok(())
}

fn print_breakdown(tables: &TpccTables, client: &TpccClient) {
    let acct = tables.accountant();
    println!("[relation]: [memory] + [disk] bytes");
    for rel in [
        RelationId::Warehouse,
        RelationId::District,
        RelationId::Item,
        RelationId::Stock,
        RelationId::Customer,
        RelationId::Order,
        RelationId::OrderLine,
        RelationId::NewOrder,
        RelationId::History,
    ] {
        println!("{}: {} + {}", rel.name(), acct.mem_of(rel), acct.disk_of(rel));
    }
    for rel in [RelationId::Stock, RelationId::Customer, RelationId::OrderLine] {
        let (in_mem, on_disk) = tables.tier_counts(rel);
        println!("{} tuples: {in_mem} in memory, {on_disk} on disk", rel.name());
    }
    println!(
        "index: {}  models: {}  mem total: {}  disk total: {}",
        tables.tree_size(),
        acct.model_footprint(),
        acct.in_mem_total(),
        acct.disk_total(),
    );
    let c = &client.counts;
    println!(
        "mix: {} new-order ({} rejected), {} payment, {} order-status, {} delivery, {} stock-level, {} aborted",
        c.new_order, c.rolled_back, c.payment, c.order_status, c.delivery, c.stock_level, c.aborted,
    );
}
