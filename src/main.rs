use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use queue_janitor::cluster::KubectlCluster;
use queue_janitor::config::JanitorConfig;
use queue_janitor::dashboard::{run_dashboard, DashboardState};
use queue_janitor::shutdown::install_shutdown_handler;
use queue_janitor::store::RedisStore;
use queue_janitor::{Driver, Janitor};

#[derive(Parser, Debug)]
#[command(name = "queue-janitor")]
#[command(version)]
#[command(about = "Requeues work stranded by dead or failed Kubernetes workers")]
struct Args {
    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = "redis-master")]
    redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    redis_port: u16,

    /// Work queues to watch, separated by --queue-delimiter
    #[arg(long, env = "QUEUE", default_value = "predict")]
    queue: String,

    /// Delimiter between queue names
    #[arg(long, env = "QUEUE_DELIMITER", default_value = ",")]
    queue_delimiter: String,

    /// Comma-separated prefixes of per-worker processing queues
    #[arg(long, env = "PROCESSING_PREFIXES", default_value = "processing")]
    processing_prefixes: String,

    /// Seconds between sweeps
    #[arg(long, env = "INTERVAL", default_value = "20")]
    interval: u64,

    /// Staleness-based repair switch: positive enables, <= 0 disables
    #[arg(long, env = "STALE_TIME", default_value = "600", allow_hyphen_values = true)]
    stale_time: i64,

    /// Seconds a worker list is trusted before querying the cluster again
    #[arg(long, env = "POD_REFRESH_INTERVAL", default_value = "5")]
    pod_refresh_interval: u64,

    /// Comma-separated worker name prefixes exempt from liveness checks
    #[arg(long, env = "WHITELISTED_PODS", default_value = "zip-consumer")]
    whitelisted_pods: String,

    /// Comma-separated worker phases treated as alive
    #[arg(long, env = "ACCEPTED_POD_PHASES", default_value = "Running")]
    accepted_pod_phases: String,

    /// Namespace to list workers in (all namespaces if unset)
    #[arg(long, env = "NAMESPACE")]
    namespace: Option<String>,

    /// Seconds to wait before retrying an unreachable Redis
    #[arg(long, env = "BACKOFF", default_value = "3")]
    backoff: u64,

    /// Delete workers found in a failed phase after requeueing their record
    #[arg(long, env = "KILL_FAILED_PODS")]
    kill_failed_pods: bool,

    /// kubectl binary used to reach the cluster
    #[arg(long, env = "KUBECTL", default_value = "kubectl")]
    kubectl: String,

    /// Port for the status endpoint (optional)
    #[arg(long, env = "STATUS_PORT")]
    status_port: Option<u16>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

impl Args {
    fn janitor_config(&self) -> JanitorConfig {
        JanitorConfig {
            interval: Duration::from_secs(self.interval),
            stale_time: self.stale_time,
            pod_refresh_interval: Duration::from_secs(self.pod_refresh_interval),
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
            backoff: Duration::from_secs(self.backoff),
            kill_failed_pods: self.kill_failed_pods,
            ..JanitorConfig::default()
        }
        .with_queues(&self.queue, &self.queue_delimiter)
        .with_whitelist(&self.whitelisted_pods)
        .with_accepted_phases(&self.accepted_pod_phases)
        .with_processing_prefixes(&self.processing_prefixes)
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.janitor_config();
    config.validate()?;

    let store = RedisStore::connect(&args.redis_host, args.redis_port).await?;
    let cluster = KubectlCluster::new(args.kubectl.clone());
    let driver = Driver::new(Janitor::new(store, cluster, config.clone()));

    if let Some(port) = args.status_port {
        let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
        let state = DashboardState {
            stats: driver.stats(),
        };
        tokio::spawn(async move {
            run_dashboard(addr, state).await;
        });
    }

    let processing = config
        .queues
        .iter()
        .flat_map(|q| config.processing_patterns(q))
        .map(|(_, glob)| glob)
        .collect::<Vec<_>>();
    tracing::info!(
        queues = ?config.queues,
        processing_queues = ?processing,
        interval = ?config.interval,
        stale_time = config.stale_time,
        namespace = ?config.namespace,
        "Janitor initialized"
    );

    let shutdown = install_shutdown_handler();
    driver.run(shutdown).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(args).await {
        let mut chain = Vec::new();
        let mut source = e.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        tracing::error!(error = %e, causes = ?chain, "Fatal error");
        std::process::exit(1);
    }
}
