use clap::Parser;
use memring::config::Config;
use memring::core::{ConnectionFactory, HashRing};
use tracing::info;

#[derive(Parser)]
#[command(name = "memring")]
#[command(about = "Probe a sharded memcached cluster and inspect its hash ring")]
struct Args {
    /// Path to the cluster configuration file
    #[arg(short, long, default_value = "cluster.yaml")]
    config: String,

    /// Keys to map to their owning backend (repeatable)
    #[arg(short, long = "key")]
    keys: Vec<String>,
}

fn init_logging() {
    let fmt = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact();

    // Map RUST_LOG to a max level (debug/info/warn/error/trace)
    let level = match std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let _ = fmt.with_max_level(level).try_init();
}

/// Dial and health-probe every configured backend, enabling the live ones on
/// the ring. Returns the number of reachable backends.
async fn probe_cluster(config: &Config, factory: &ConnectionFactory, ring: &HashRing) -> usize {
    let mut reachable = 0;

    for (index, address) in config.servers.iter().enumerate() {
        match factory.dial(address, index).await {
            Ok(mut conn) => {
                if conn.is_healthy().await {
                    ring.add(address);
                    reachable += 1;
                    println!("{address}: ok");
                } else {
                    println!("{address}: connected but failed liveness probe");
                }
                conn.close().await;
            }
            Err(e) => println!("{address}: unreachable ({e})"),
        }
    }

    reachable
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    let config = Config::from_yaml_file(&args.config).await?;
    info!("probing {} configured backends", config.servers.len());

    let factory = ConnectionFactory::new(&config);
    let ring = HashRing::new(&config);

    let reachable = probe_cluster(&config, &factory, &ring).await;
    println!(
        "{} of {} backends reachable, {} virtual nodes on the ring",
        reachable,
        config.servers.len(),
        ring.node_count()
    );

    for key in &args.keys {
        match ring.lookup(key) {
            Ok(index) => println!("{key} -> {}", config.servers[index]),
            Err(e) => println!("{key} -> {e}"),
        }
    }

    if reachable == 0 {
        std::process::exit(1);
    }
    Ok(())
}
