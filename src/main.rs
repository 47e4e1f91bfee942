use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kubechaos::{
    chaos::{ChaosEngine, NetworkFaultController, SignalAwarePause, TcNetworkControl},
    config::Config,
    k8s::K8sClient,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting KubeChaos");

    // Load configuration
    let config = Config::load()?;
    let action = config.fault_action()?;
    let filter = config.victim_filter()?;
    tracing::info!(action = %action, namespaces = ?config.namespaces, "Configuration loaded");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let k8s = K8sClient::new().await?;
    if let Err(e) = k8s.health_check().await {
        tracing::warn!("Kubernetes cluster health check failed: {}", e);
    }

    let network = NetworkFaultController::new(TcNetworkControl::new(&config.tc_path), SignalAwarePause);
    let mut engine = ChaosEngine::new(&k8s, config.namespaces.clone(), network)
        .with_exec_timeout(config.exec_timeout());

    let outcome = engine.run(&action, &filter, &mut rng).await?;
    tracing::info!(outcome = %outcome, "Chaos action finished");

    Ok(())
}
