//! ORDO CLI
//!
//! Command-line host for the ORDO memoizing cache and priority scheduler.

mod task_arg;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ordo_cache::MemoCache;
use ordo_core::config::OrdoConfig;
use ordo_core::constants::{CONFIG_ENV_VAR, DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER};
use ordo_core::error::OrdoError;
use ordo_scheduler::PriorityScheduler;

use crate::task_arg::TaskArg;

/// ORDO - memoize computations, dispatch work by priority
#[derive(Parser)]
#[command(name = "ordo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through binary operations, filtering, the cache, and the scheduler
    Demo,

    /// Queue tasks and dispatch them all in priority order
    Schedule {
        /// Tasks as name:priority (higher priority runs first)
        #[arg(required = true)]
        tasks: Vec<TaskArg>,
    },

    /// Square a number repeatedly through the cache
    Memo {
        /// Number to square
        #[arg(allow_negative_numbers = true)]
        key: i64,
        /// TTL in seconds (zero or negative disables caching)
        #[arg(long, allow_negative_numbers = true)]
        ttl: Option<i64>,
        /// How many times to ask for the result
        #[arg(short, long, default_value = "3")]
        repeat: usize,
        /// Pause between requests in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,
    },

    /// Run a concurrent throughput check
    Bench {
        /// Number of tasks / cache requests to generate
        #[arg(short, long, default_value = "100000")]
        count: usize,
        /// Worker threads
        #[arg(short, long, default_value = "4")]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => OrdoConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => OrdoConfig::default(),
    };

    // Initialize logging
    let filter = if cli.verbose {
        VERBOSE_LOG_FILTER.to_string()
    } else {
        config
            .log_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Demo => cmd_demo(&config),
        Commands::Schedule { tasks } => cmd_schedule(tasks),
        Commands::Memo {
            key,
            ttl,
            repeat,
            interval_ms,
        } => cmd_memo(&config, key, ttl, repeat, interval_ms),
        Commands::Bench { count, threads } => cmd_bench(&config, count, threads),
    }
}

/// Applies a two-argument operation.
fn apply<T>(a: T, b: T, operation: impl FnOnce(T, T) -> T) -> T {
    operation(a, b)
}

/// Guided tour of every component
fn cmd_demo(config: &OrdoConfig) -> Result<()> {
    println!("{}", "=== BINARY OPERATIONS ===".cyan().bold());
    println!("{}", apply(10, 5, |a, b| a + b));
    println!("{}", apply(10, 5, |a, b| a * b));

    println!("\n{}", "=== FILTERED COLLECTION ===".cyan().bold());
    let items = vec![10, 25, 5];
    for item in items.iter().filter(|x| **x > 10) {
        println!("{}", item);
    }

    println!("\n{}", "=== FUNCTION CACHE ===".cyan().bold());
    let cache = MemoCache::with_config(config.cache.clone());
    let square = |x: &i64| {
        println!("   {}", "Calculating...".dimmed());
        x * x
    };
    println!("{}", cache.execute_secs(4, square, 5));
    println!("{}", cache.execute_secs(4, square, 5));

    println!("\n{}", "=== TASK SCHEDULER ===".cyan().bold());
    let scheduler = PriorityScheduler::new();
    scheduler.add_task("Low priority task", 1);
    scheduler.add_task("High priority task", 10);

    for _ in 0..3 {
        if scheduler.execute_next(|task| println!("{}", task)).is_idle() {
            println!("{}", "No tasks to execute".yellow());
        }
    }

    Ok(())
}

/// Queue the given tasks, then dispatch until empty
fn cmd_schedule(tasks: Vec<TaskArg>) -> Result<()> {
    println!("{} {} tasks", "📋 Scheduling".cyan().bold(), tasks.len());

    let scheduler = PriorityScheduler::new();
    for task in tasks {
        let priority = task.priority;
        scheduler.add_task(task, priority);
    }

    let priorities = scheduler.priorities();
    println!(
        "   {} {}",
        "Priorities:".dimmed(),
        priorities
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" > ")
    );

    let mut order = 0;
    scheduler.execute_all(|task| {
        order += 1;
        println!(
            "   {:>3}. {} {}",
            order,
            task.name.green(),
            format!("(priority {})", task.priority).dimmed()
        );
    });

    let stats = scheduler.stats();
    println!(
        "\n{} dispatched {}, pending {}",
        "✅ Done:".green().bold(),
        stats.dispatched,
        stats.pending
    );

    Ok(())
}

/// Square `key` through the cache `repeat` times
fn cmd_memo(
    config: &OrdoConfig,
    key: i64,
    ttl: Option<i64>,
    repeat: usize,
    interval_ms: u64,
) -> Result<()> {
    let ttl_seconds = match ttl {
        Some(ttl) => ttl,
        None => i64::try_from(config.cache.default_ttl_seconds)
            .context("default_ttl_seconds does not fit in i64")?,
    };
    println!(
        "{} {} (ttl {}s, {} requests)",
        "🧮 Memoizing square of".cyan().bold(),
        key,
        ttl_seconds,
        repeat
    );

    let cache = MemoCache::with_config(config.cache.clone());
    let computations = AtomicUsize::new(0);

    for i in 0..repeat {
        if i > 0 && interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
        let value = cache.execute_secs(
            key,
            |x: &i64| {
                computations.fetch_add(1, Ordering::Relaxed);
                println!("   {}", "Calculating...".dimmed());
                x.wrapping_mul(*x)
            },
            ttl_seconds,
        );
        println!("   #{} → {}", i + 1, value);
    }

    let stats = cache.stats();
    println!("\n{}", "📊 Cache:".green().bold());
    println!("   Computations: {}", computations.load(Ordering::Relaxed));
    println!("   Hits:         {}", stats.hits);
    println!("   Misses:       {}", stats.misses);

    Ok(())
}

fn check_bench_args(count: usize, threads: usize) -> ordo_core::Result<()> {
    if count == 0 {
        return Err(OrdoError::ValidationError("count must be positive".into()));
    }
    if threads == 0 {
        return Err(OrdoError::ValidationError("threads must be positive".into()));
    }
    Ok(())
}

/// Concurrent throughput run for both components
fn cmd_bench(config: &OrdoConfig, count: usize, threads: usize) -> Result<()> {
    check_bench_args(count, threads)?;

    println!("{}", "📊 ORDO Benchmark".cyan().bold());
    println!("   Requests: {}, threads: {}\n", count, threads);

    let pb = ProgressBar::new(count as u64 * 2);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let per_thread = count.div_ceil(threads);

    // Scheduler: concurrent admission, then concurrent dispatch.
    println!("{}", "1. Scheduler...".dimmed());
    let scheduler: PriorityScheduler<usize, usize> = PriorityScheduler::new();
    let start = Instant::now();
    std::thread::scope(|s| {
        for t in 0..threads {
            let (scheduler, pb) = (&scheduler, &pb);
            s.spawn(move || {
                let begin = t * per_thread;
                for i in begin..(begin + per_thread).min(count) {
                    scheduler.add_task(i, i % 32);
                }
                pb.inc(((begin + per_thread).min(count).saturating_sub(begin)) as u64);
            });
        }
    });
    let dispatched = AtomicUsize::new(0);
    std::thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                while scheduler.next_task().is_some() {
                    dispatched.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });
    let scheduler_time = start.elapsed();

    // Cache: a key space one tenth the request count, so most requests hit.
    println!("{}", "2. Cache...".dimmed());
    let cache: MemoCache<usize, usize> = MemoCache::with_config(config.cache.clone());
    let key_space = (count / 10).max(1);
    let ttl = config.cache.default_ttl_duration();
    let start = Instant::now();
    std::thread::scope(|s| {
        for t in 0..threads {
            let (cache, pb) = (&cache, &pb);
            s.spawn(move || {
                let begin = t * per_thread;
                let end = (begin + per_thread).min(count);
                for i in begin..end {
                    cache.execute(i % key_space, |k| k.wrapping_mul(*k), ttl);
                }
                pb.inc(end.saturating_sub(begin) as u64);
            });
        }
    });
    let cache_time = start.elapsed();
    pb.finish();

    let stats = cache.stats();
    let rate = |elapsed: Duration| count as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!("\n{}", "📈 Results:".green().bold());
    println!(
        "   Scheduler: {} tasks in {:?} ({:.0} tasks/sec)",
        dispatched.load(Ordering::Relaxed),
        scheduler_time,
        rate(scheduler_time)
    );
    println!(
        "   Cache:     {} requests in {:?} ({:.0} req/sec), {} hits / {} misses",
        count,
        cache_time,
        rate(cache_time),
        stats.hits,
        stats.misses
    );

    let computed_once = !config.cache.track_stats || stats.misses as usize == key_space;
    if dispatched.load(Ordering::Relaxed) == count && computed_once {
        println!("   {} Every task ran once, every key computed once", "✅".green());
    } else {
        println!(
            "   {} Expected {} dispatches and {} computations",
            "❌".red(),
            count,
            key_space
        );
    }

    Ok(())
}
