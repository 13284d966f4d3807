//! Benchmark chunk merging on a synthetic tiled forest.
//!
//! Run with: cargo run --release --features bench --bin bench_merge
//!
//! Usage:
//!   bench_merge                 Run default size (200k points)
//!   bench_merge 100k 1m         Run multiple sizes
//!   bench_merge --tiles 6       Use a 6x6 tile grid
//!   bench_merge --strategy both Compare grid and exhaustive matching
//!   bench_merge -n 10           Run 10 iterations (for profiling)
//!
//! For per-phase timing, add `--features timing` and set `RUST_LOG=info`.

use clap::{Parser, ValueEnum};
use lidar_chunk_merge::{
    merge_group, ChunkGroup, GroupOutput, MatchStrategy, MergeConfig, PointTable,
};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::{self, Write};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn parse_count(s: &str) -> Result<usize, String> {
    let s = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('m') {
        (n, 1_000_000)
    } else if let Some(n) = s.strip_suffix('k') {
        (n, 1_000)
    } else {
        (s.as_str(), 1)
    };

    num_str
        .parse::<f64>()
        .map(|n| (n * multiplier as f64) as usize)
        .map_err(|e| format!("Invalid number '{}': {}", s, e))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Grid,
    Exhaustive,
    Both,
}

impl StrategyArg {
    fn strategies(self) -> &'static [MatchStrategy] {
        match self {
            StrategyArg::Grid => &[MatchStrategy::Grid],
            StrategyArg::Exhaustive => &[MatchStrategy::Exhaustive],
            StrategyArg::Both => &[MatchStrategy::Grid, MatchStrategy::Exhaustive],
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "bench_merge")]
#[command(about = "Benchmark border matching and label unification on tiled forests")]
struct Args {
    /// Total point counts to benchmark (e.g., 100k, 1m)
    #[arg(value_parser = parse_count, default_value = "200k")]
    sizes: Vec<usize>,

    /// Tiles per side of the square tile grid
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..))]
    tiles: u64,

    /// Tile edge length in metres
    #[arg(long, default_value_t = 25.0)]
    tile_size: f64,

    /// Mean points per tree crown
    #[arg(long, default_value_t = 2_000)]
    points_per_tree: usize,

    /// Matching strategy to run
    #[arg(long, value_enum, default_value_t = StrategyArg::Grid)]
    strategy: StrategyArg,

    /// Worker threads (default: all cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Number of iterations to run (useful for profiling)
    #[arg(short = 'n', long, default_value_t = 1)]
    repeat: usize,

    /// RNG seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,
}

/// Scatter trees over a `tiles x tiles` grid and cut the cloud into per-tile chunks.
///
/// Each chunk labels its trees locally from 1, so a crown cut by a tile edge
/// carries a different label on each side.
fn generate_group(
    total: usize,
    tiles: usize,
    tile_size: f64,
    points_per_tree: usize,
    seed: u64,
) -> ChunkGroup {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let extent = tiles as f64 * tile_size;
    let trees = (total / points_per_tree.max(1)).max(1);

    // (tile index, x, y, z, tree id or 0 for ground)
    let mut rows: Vec<Vec<(f64, f64, f64, u32)>> = vec![Vec::new(); tiles * tiles];
    let tile_of = |x: f64, y: f64| {
        let ix = ((x / tile_size) as usize).min(tiles - 1);
        let iy = ((y / tile_size) as usize).min(tiles - 1);
        iy * tiles + ix
    };

    for tree in 1..=trees as u32 {
        let cx = rng.gen_range(0.0..extent);
        let cy = rng.gen_range(0.0..extent);
        let radius = rng.gen_range(1.5..4.0);
        let height = rng.gen_range(8.0..25.0);
        for _ in 0..points_per_tree {
            let r = radius * rng.gen::<f64>().sqrt();
            let theta = rng.gen_range(0.0..std::f64::consts::TAU);
            let x = (cx + r * theta.cos()).clamp(0.0, extent);
            let y = (cy + r * theta.sin()).clamp(0.0, extent);
            let z = rng.gen_range(0.0..height);
            rows[tile_of(x, y)].push((x, y, z, tree));
        }
    }
    let ground = total.saturating_sub(trees * points_per_tree);
    for _ in 0..ground {
        let x = rng.gen_range(0.0..extent);
        let y = rng.gen_range(0.0..extent);
        rows[tile_of(x, y)].push((x, y, rng.gen_range(0.0..0.3), 0));
    }

    let mut group = ChunkGroup::new(format!("bench_{seed}"));
    for (t, tile_rows) in rows.into_iter().enumerate() {
        let mut local: Vec<u32> = Vec::new();
        let mut x = Vec::with_capacity(tile_rows.len());
        let mut y = Vec::with_capacity(tile_rows.len());
        let mut z = Vec::with_capacity(tile_rows.len());
        let mut preds = Vec::with_capacity(tile_rows.len());
        for (px, py, pz, tree) in tile_rows {
            x.push(px);
            y.push(py);
            z.push(pz);
            let label = if tree == 0 {
                0
            } else {
                match local.iter().position(|&t| t == tree) {
                    Some(i) => i as u32 + 1,
                    None => {
                        local.push(tree);
                        local.len() as u32
                    }
                }
            };
            preds.push(label as f64);
        }
        let table = PointTable::new()
            .with_column("x", x)
            .with_column("y", y)
            .with_column("z", z)
            .with_column("preds", preds);
        group = group.with_chunk(format!("tile_{:02}_{:02}", t % tiles, t / tiles), table);
    }
    group
}

fn format_rate(n: usize, ms: f64) -> String {
    let rate = n as f64 / (ms / 1000.0);
    if rate >= 1_000_000.0 {
        format!("{:.2}M/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}k/s", rate / 1_000.0)
    } else {
        format!("{:.0}/s", rate)
    }
}

fn format_num(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

struct BenchResult {
    n: usize,
    strategy: MatchStrategy,
    time_ms: f64,
    instances: usize,
    comparisons: u64,
    unions: usize,
}

fn run_once(group: &ChunkGroup, config: &MergeConfig) -> (f64, GroupOutput) {
    let start = Instant::now();
    let output = match merge_group(group, config) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("merge failed: {e}");
            std::process::exit(1);
        }
    };
    (start.elapsed().as_secs_f64() * 1000.0, output)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let tiles = args.tiles as usize;

    println!("Chunk Merge Benchmark");
    println!("=====================");
    println!(
        "Tiles: {}x{} of {:.1}m, {} pts/tree",
        tiles, tiles, args.tile_size, args.points_per_tree
    );
    if let Some(w) = args.workers {
        println!("Workers: {}", w);
    } else {
        #[cfg(feature = "parallel")]
        println!("Workers: {} (all cores)", rayon::current_num_threads());
        #[cfg(not(feature = "parallel"))]
        println!("Workers: 1 (parallel feature disabled)");
    }

    let mut results: Vec<BenchResult> = Vec::new();

    for &n in &args.sizes {
        println!("\n{}", "-".repeat(60));
        print!("Generating {} points... ", format_num(n));
        io::stdout().flush().ok();
        let t0 = Instant::now();
        let group = generate_group(n, tiles, args.tile_size, args.points_per_tree, args.seed);
        println!("{:.1}ms", t0.elapsed().as_secs_f64() * 1000.0);

        let mut canonical: Option<Vec<u32>> = None;

        for &strategy in args.strategy.strategies() {
            let config = MergeConfig {
                strategy,
                workers: args.workers,
                ..Default::default()
            };

            println!("\n{:?}:", strategy);
            let mut times = Vec::with_capacity(args.repeat);
            let mut last = None;
            for i in 0..args.repeat.max(1) {
                if args.repeat > 1 {
                    print!("  Run {}/{}... ", i + 1, args.repeat);
                    io::stdout().flush().ok();
                }
                let (ms, output) = run_once(&group, &config);
                if args.repeat > 1 {
                    println!("{:.1}ms", ms);
                }
                times.push(ms);
                last = Some(output);
            }
            let Some(output) = last else { continue };

            let avg = times.iter().sum::<f64>() / times.len() as f64;
            if args.repeat > 1 {
                let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                println!("  Min time:      {:>8.1}ms", min);
                println!("  Max time:      {:>8.1}ms", max);
                println!("  Avg time:      {:>8.1}ms", avg);
            } else {
                println!("  Total time:    {:>8.1}ms", avg);
            }
            println!("  Throughput:    {:>8}", format_rate(n, avg));
            println!("  Instances:     {:>8}", format_num(output.instances.len()));
            println!("  Unions:        {:>8}", format_num(output.unions.len()));
            println!(
                "  Comparisons:   {:>8}",
                format_num(output.matching.comparisons as usize)
            );

            match &canonical {
                None => canonical = Some(output.table.instance_labels.clone()),
                Some(expected) => {
                    if *expected == output.table.instance_labels {
                        println!("  Labels match the first strategy");
                    } else {
                        println!("  WARNING: labels differ from the first strategy");
                    }
                }
            }

            results.push(BenchResult {
                n,
                strategy,
                time_ms: avg,
                instances: output.instances.len(),
                comparisons: output.matching.comparisons,
                unions: output.unions.len(),
            });
        }
    }

    if results.len() > 1 {
        println!("\n\n{}", "=".repeat(72));
        println!("SUMMARY");
        println!("{}", "=".repeat(72));
        println!(
            "{:>10} | {:>10} | {:>10} | {:>12} | {:>10} | {:>8}",
            "n", "strategy", "time", "comparisons", "instances", "unions"
        );
        println!(
            "{:-<10}-+-{:-<10}-+-{:-<10}-+-{:-<12}-+-{:-<10}-+-{:-<8}",
            "", "", "", "", "", ""
        );
        for r in &results {
            println!(
                "{:>10} | {:>10} | {:>8.1}ms | {:>12} | {:>10} | {:>8}",
                format_num(r.n),
                format!("{:?}", r.strategy),
                r.time_ms,
                format_num(r.comparisons as usize),
                format_num(r.instances),
                r.unions
            );
        }
    }

    println!("\nBenchmark complete.");
}
