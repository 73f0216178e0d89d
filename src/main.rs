//! Benchmark runner: Winograd F(6,3) against direct convolution.

use std::time::Instant;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use winograd63::kernels::Microkernel;
use winograd63::{
    ConvConfig, ConvOptions, FeatureMap, MicrokernelChoice, OutputShape, conv3x3_direct,
    convolve, tolerance, transform_filter,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output sizes to run (square)
    #[arg(long, value_delimiter = ',', default_values_t = vec![30, 62, 126])]
    sizes: Vec<usize>,
    /// Input and output channels
    #[arg(short, long, default_value_t = 64)]
    channels: usize,
    #[arg(short, long, default_value_t = 3)]
    iterations: usize,
    /// Worker threads for the multi-threaded run; 0 = all cores
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
    /// Force the portable microkernel
    #[arg(long)]
    portable: bool,
}

fn main() -> winograd63::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let microkernel = if cli.portable {
        MicrokernelChoice::Portable
    } else {
        MicrokernelChoice::Auto
    };

    println!("=== Winograd F(6,3) Convolution Benchmark ===\n");
    println!(
        "Microkernel: {}, channels: {}\n",
        Microkernel::select(microkernel).name(),
        cli.channels
    );

    let single = ConvOptions::single_threaded().with_microkernel(microkernel);
    let parallel = ConvOptions::from_config(&ConvConfig {
        num_threads: cli.threads,
        microkernel,
        ..ConvConfig::default()
    })?;
    info!(threads = parallel.num_threads(), "worker pool ready");

    let mut all_results = Vec::new();

    for &size in &cli.sizes {
        println!("Output: {}×{}×{}", size, size, cli.channels);
        println!("{}", "-".repeat(60));

        let c = cli.channels;
        let (in_w, in_h) = (size + 2, size + 2);
        let input: Vec<f32> = (0..c * in_w * in_h).map(|i| (i % 17) as f32 / 8.0 - 1.0).collect();
        let weights: Vec<f32> = (0..c * c * 9)
            .map(|i| ((i % 13) as f32 - 6.0) / (6.0 * (9 * c) as f32).sqrt())
            .collect();
        let map = FeatureMap::from_planar_f32(&input, in_w, in_h, c)?;
        let filter = transform_filter(&weights, c, c, &parallel)?;
        let shape = OutputShape::new(size, size);
        let flops = 2.0 * (9 * c * c * size * size) as f64;

        let (direct_ms, expected) = time(cli.iterations, || {
            conv3x3_direct(&input, in_w, in_h, c, &weights, None, c, size, size)
        });
        let (single_ms, single_out) =
            time(cli.iterations, || convolve(&map, &filter, None, shape, &single));
        let (parallel_ms, got) =
            time(cli.iterations, || convolve(&map, &filter, None, shape, &parallel));

        single_out?;
        let got = got?.to_planar_f32();
        let max_err = got
            .iter()
            .zip(&expected)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        let bound = tolerance(c) * expected.iter().fold(1.0f32, |m, x| m.max(x.abs()));

        let results = vec![
            ("Direct (f32)", direct_ms),
            ("Winograd", single_ms),
            ("Winograd MT", parallel_ms),
        ];
        for (i, (name, ms)) in results.iter().enumerate() {
            println!(
                "{}. {:14} {:8.2} ms  {:6.2} GFLOPS  ({:.1}×)",
                i + 1,
                name,
                ms,
                flops / (ms / 1000.0) / 1e9,
                direct_ms / ms
            );
        }
        println!("   max |winograd - direct| = {:.4} (bound {:.4})\n", max_err, bound);

        all_results.push((size, results));
    }

    print_summary_table(&all_results);
    Ok(())
}

/// Average wall time in ms over `iterations` runs after one warmup.
fn time<T>(iterations: usize, mut f: impl FnMut() -> T) -> (f64, T) {
    let mut last = f();

    let mut total = 0.0;
    for _ in 0..iterations {
        let start = Instant::now();
        last = f();
        total += start.elapsed().as_secs_f64();
    }

    (total / iterations.max(1) as f64 * 1000.0, last)
}

fn print_summary_table(all_results: &[(usize, Vec<(&str, f64)>)]) {
    if all_results.is_empty() {
        return;
    }

    println!("{}", "=".repeat(60));
    println!("SUMMARY (speedup over direct)");
    println!("{}", "=".repeat(60));

    print!("{:<16}", "Method");
    for (size, _) in all_results {
        print!(" {:>12}", format!("{}×{}", size, size));
    }
    println!();
    println!("{}", "-".repeat(60));

    let num_methods = all_results[0].1.len();
    for method_idx in 0..num_methods {
        print!("{:<16}", all_results[0].1[method_idx].0);
        for (_, results) in all_results {
            let baseline = results[0].1;
            print!(" {:>11.1}×", baseline / results[method_idx].1);
        }
        println!();
    }

    println!("{}", "=".repeat(60));
}
