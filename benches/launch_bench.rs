// Launch-to-join latency of guest contexts under both policies.
// Target: p95 below 5ms for a guest that returns immediately.

use guestbox::{
    BaseNamespace, Catalog, IsolatedSupervisor, LaunchSpec, Library, SharedSupervisor, Supervisor,
    SupervisorConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const ITERATIONS: usize = 500;
const WARMUP_ITERATIONS: usize = 50;
const P95_BUDGET: Duration = Duration::from_millis(5);

struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();
        let at = |q: f64| samples[((len as f64 * q) as usize).min(len - 1)];
        let sum: Duration = samples.iter().sum();

        Self {
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
            min: samples[0],
            max: samples[len - 1],
            mean: sum / len as u32,
        }
    }

    fn print(&self, label: &str) {
        println!("\n=== {} ===", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::new().with_library(
        Library::new("bench")
            .with_entry_point("noop", |_| Ok(()))
            .with_entry_point("props", |_| {
                guestbox::properties::ambient::set_property("bench.k", "v");
                Ok(())
            }),
    ))
}

fn measure(supervisor: &dyn Supervisor, entry: &str) -> LatencyStats {
    let spec = LaunchSpec::new(entry)
        .with_code_location("bench")
        .with_property("bench.iteration", "0");

    for _ in 0..WARMUP_ITERATIONS {
        let _ = supervisor.launch(&spec).map(|context| context.join());
    }

    let samples = (0..ITERATIONS)
        .map(|_| {
            let started = Instant::now();
            match supervisor.launch(&spec) {
                Ok(context) => {
                    let _ = context.join();
                }
                Err(e) => eprintln!("launch failed: {}", e),
            }
            started.elapsed()
        })
        .collect();
    LatencyStats::from_samples(samples)
}

fn main() {
    println!("=== guestbox launch benchmark ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let base = Arc::new(BaseNamespace::builtin());
    let isolated = IsolatedSupervisor::new(SupervisorConfig::default(), catalog(), base.clone());
    let shared = SharedSupervisor::new(SupervisorConfig::default(), catalog(), base);

    let results = [
        ("isolated / noop", measure(&isolated, "noop")),
        ("isolated / props", measure(&isolated, "props")),
        ("shared / noop", measure(&shared, "noop")),
        ("shared / props", measure(&shared, "props")),
    ];

    let mut over_budget = 0;
    for (label, stats) in &results {
        stats.print(label);
        if stats.p95 > P95_BUDGET {
            println!("  over budget ({:?} > {:?})", stats.p95, P95_BUDGET);
            over_budget += 1;
        }
    }

    println!("\n=== Summary ===");
    println!("{}/{} scenarios within budget", results.len() - over_budget, results.len());
    if over_budget > 0 {
        std::process::exit(1);
    }
}
