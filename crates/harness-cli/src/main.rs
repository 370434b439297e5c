//! regharness - integration-test pipeline against live regtest nodes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use harness_cache::{BinaryCache, CacheKey};
use harness_core::{Granularity, RunId, RunReport, RunResult, WorkItem, WorkManifest};
use harness_discover::Discovery;
use harness_node::{BitcoindProvider, NodeConfig, NodeManager, ReadinessConfig};
use harness_runner::{JobRunner, WorkerPool};

/// regharness - run ignored integration tests against fresh bitcoind nodes
#[derive(Parser)]
#[command(name = "regharness")]
#[command(about = "Integration-test harness for tests needing a live Bitcoin node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate ignored tests and emit the work manifest as JSON
    Discover {
        /// Directory holding compiled test binaries (e.g. target/debug/deps)
        #[arg(long)]
        artifact_dir: PathBuf,

        /// Shard one work item per test instead of per binary
        #[arg(long)]
        per_test: bool,

        /// Write the manifest here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Full local pipeline: discover, execute with a bounded pool, report
    Run {
        /// Directory holding compiled test binaries
        #[arg(long)]
        artifact_dir: PathBuf,

        /// Shard one work item per test instead of per binary
        #[arg(long)]
        per_test: bool,

        /// Worker-pool width (concurrent nodes)
        #[arg(short, long, default_value_t = default_jobs())]
        jobs: usize,

        #[command(flatten)]
        node: NodeOpts,

        #[command(flatten)]
        cache: CacheOpts,
    },

    /// Execute one work item of a serialized manifest (matrix-shard mode)
    Exec {
        /// Manifest produced by `discover`
        #[arg(long)]
        manifest: PathBuf,

        /// Zero-based index of the item to execute
        #[arg(long)]
        index: usize,

        #[command(flatten)]
        node: NodeOpts,

        #[command(flatten)]
        cache: CacheOpts,
    },
}

/// Node provisioning and timeout knobs.
#[derive(Args)]
struct NodeOpts {
    /// Path to the bitcoind executable
    #[arg(long, default_value = "bitcoind")]
    bitcoind: PathBuf,

    /// First RPC port; instances take consecutive port pairs from here
    #[arg(long, default_value_t = 18500)]
    base_rpc_port: u16,

    /// RPC username for spawned nodes
    #[arg(long, default_value = "harness")]
    rpc_user: String,

    /// RPC password for spawned nodes
    #[arg(long, default_value = "harness")]
    rpc_pass: String,

    /// Deadline for a started node to answer its health probe (seconds)
    #[arg(long, default_value_t = 30)]
    readiness_timeout_secs: u64,

    /// Interval between health probes (milliseconds)
    #[arg(long, default_value_t = 250)]
    probe_interval_ms: u64,

    /// Per-item execution timeout (seconds)
    #[arg(long, default_value_t = 600)]
    exec_timeout_secs: u64,
}

impl NodeOpts {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            bitcoind_path: self.bitcoind.clone(),
            base_rpc_port: self.base_rpc_port,
            rpc_user: self.rpc_user.clone(),
            rpc_pass: self.rpc_pass.clone(),
            extra_args: Vec::new(),
        }
    }

    fn readiness_config(&self) -> ReadinessConfig {
        ReadinessConfig {
            readiness_timeout: Duration::from_secs(self.readiness_timeout_secs),
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            ..ReadinessConfig::default()
        }
    }

    fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

/// Optional binary cache shared by matrix shards.
#[derive(Args)]
struct CacheOpts {
    /// Cache directory; omit to disable caching
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Exact pinned native-dependency version the binaries were built with
    #[arg(long, default_value = "unpinned")]
    pin_version: String,

    /// Toolchain identity of the build
    #[arg(long, default_value = "stable")]
    toolchain: String,
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run_command(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Pipeline aborted");
            ExitCode::from(2)
        }
    }
}

async fn run_command(command: Commands) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Commands::Discover {
            artifact_dir,
            per_test,
            out,
        } => {
            let manifest = discover(&artifact_dir, per_test).await?;
            let json = serde_json::to_string_pretty(&manifest)?;
            match out {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{}", json),
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Run {
            artifact_dir,
            per_test,
            jobs,
            node,
            cache,
        } => {
            let manifest = discover(&artifact_dir, per_test).await?;
            if manifest.is_empty() {
                info!("Nothing to run; no ignored tests discovered");
                return Ok(ExitCode::SUCCESS);
            }
            let manifest = resolve_manifest(manifest, &cache)?;

            let nodes = Arc::new(NodeManager::new(
                Arc::new(BitcoindProvider::new(node.node_config())),
                node.readiness_config(),
            ));
            let runner = Arc::new(JobRunner::new(
                nodes,
                manifest.run_id.clone(),
                node.exec_timeout(),
            ));
            let pool = WorkerPool::new(runner, jobs);

            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());

            let mut stream = pool.execute(&manifest, cancel);
            let mut results = Vec::with_capacity(manifest.len());
            while let Some(result) = stream.next().await {
                print_result(&result);
                results.push(result);
            }

            let report = RunReport::from_results(&results);
            println!("\n{}", report);
            Ok(ExitCode::from(exit_code(&report)))
        }

        Commands::Exec {
            manifest,
            index,
            node,
            cache,
        } => {
            let manifest: WorkManifest = serde_json::from_str(&std::fs::read_to_string(&manifest)?)?;
            let item = manifest
                .items
                .get(index)
                .ok_or_else(|| format!("manifest has no item at index {}", index))?
                .clone();
            let item = resolve_item(item, &manifest.run_id, &cache)?;

            let nodes = Arc::new(NodeManager::new(
                Arc::new(BitcoindProvider::new(node.node_config())),
                node.readiness_config(),
            ));
            let runner = JobRunner::new(nodes, manifest.run_id.clone(), node.exec_timeout());

            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());

            let result = runner.run(&item, &cancel).await;
            print_result(&result);
            if !result.stdout.is_empty() {
                println!("--- stdout ---\n{}", result.stdout);
            }
            if !result.stderr.is_empty() {
                println!("--- stderr ---\n{}", result.stderr);
            }

            let report = RunReport::from_results(std::iter::once(&result));
            Ok(ExitCode::from(exit_code(&report)))
        }
    }
}

async fn discover(
    artifact_dir: &std::path::Path,
    per_test: bool,
) -> Result<WorkManifest, Box<dyn std::error::Error>> {
    let granularity = if per_test {
        Granularity::PerTest
    } else {
        Granularity::PerBinary
    };
    let discovery = Discovery::new(granularity);
    let binaries = discovery.collect_artifacts(artifact_dir)?;
    let manifest = discovery.discover(&binaries).await?;
    info!(run = %manifest.run_id, items = manifest.len(), "Discovery complete");
    Ok(manifest)
}

/// Route every item's binary through the cache, when one is configured.
fn resolve_manifest(
    manifest: WorkManifest,
    cache: &CacheOpts,
) -> Result<WorkManifest, Box<dyn std::error::Error>> {
    let run_id = manifest.run_id.clone();
    let items = manifest
        .items
        .into_iter()
        .map(|item| resolve_item(item, &run_id, cache))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WorkManifest {
        run_id: manifest.run_id,
        created_at: manifest.created_at,
        items,
    })
}

/// On a hit, rewrite the item to the cached binary; on a miss with a
/// local binary present, populate the cache so sibling shards hit.
fn resolve_item(
    item: WorkItem,
    run_id: &RunId,
    opts: &CacheOpts,
) -> Result<WorkItem, Box<dyn std::error::Error>> {
    let Some(cache_dir) = &opts.cache_dir else {
        return Ok(item);
    };
    let cache = BinaryCache::new(cache_dir.clone())?;
    let key = item_cache_key(&item, run_id, opts)?;

    if let Some(cached) = cache.get(&key)? {
        info!(item = %item.id, binary = %cached.display(), "Using cached binary");
        return Ok(WorkItem {
            binary: cached,
            ..item
        });
    }
    if item.binary.is_file() {
        cache.put(&key, &item.binary)?;
        return Ok(item);
    }
    warn!(item = %item.id, binary = %item.binary.display(), "Binary neither cached nor present");
    Ok(item)
}

/// Cache identity of one item's binary: pin + toolchain + run, with the
/// binary file name folded into the run component so items of the same
/// run occupy distinct slots.
fn item_cache_key(
    item: &WorkItem,
    run_id: &RunId,
    opts: &CacheOpts,
) -> Result<CacheKey, Box<dyn std::error::Error>> {
    let file_name = item
        .binary
        .file_name()
        .ok_or_else(|| format!("work item binary has no file name: {}", item.binary.display()))?
        .to_string_lossy();
    Ok(CacheKey::new(
        &opts.pin_version,
        &opts.toolchain,
        RunId::new(format!("{}/{}", run_id, file_name)),
    ))
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling run");
            cancel.cancel();
        }
    });
}

fn print_result(result: &RunResult) {
    let tag = result.status.to_string().to_uppercase();
    match &result.message {
        Some(message) => println!("[{}] {} ({})", tag, result.label, message),
        None => println!("[{}] {}", tag, result.label),
    }
}

/// Exit-code policy: 0 all passed, 1 test failures only, 2 anything
/// infrastructural (which also covers discovery failure upstream).
fn exit_code(report: &RunReport) -> u8 {
    if report.success() {
        0
    } else if report.has_infrastructure_failure() {
        2
    } else {
        1
    }
}
