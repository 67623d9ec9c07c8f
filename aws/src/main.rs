use aws::{AwsProvider, ProviderConfig};
use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;
use tfcore::{
    Context, DesiredConfig, EngineConfig, FileStateStore, Reconciler, ResourceAddress, StateStore,
    TfcoreError,
};

const USAGE: &str = "usage: aws-reconcile <desired.json> <state.json> [--plan]";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    match run().await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            tracing::error!("{} resource(s) failed to reconcile", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns the number of resources that failed
async fn run() -> tfcore::Result<usize> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let plan_only = args.iter().any(|a| a == "--plan");
    let paths: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    let [config_path, state_path] = paths.as_slice() else {
        return Err(TfcoreError::Config(USAGE.to_string()));
    };

    let desired = DesiredConfig::from_json(&tokio::fs::read(config_path).await?)?;
    let store = Arc::new(FileStateStore::open(state_path).await?);

    let provider = AwsProvider::new(&ProviderConfig::from_env()?)?;
    let reconciler = Arc::new(Reconciler::new(
        provider.registry()?,
        store.clone(),
        EngineConfig::from_env()?,
    ));

    if plan_only {
        let mut addresses: BTreeSet<ResourceAddress> = desired.addresses().collect();
        addresses.extend(store.list().await?);

        for address in addresses {
            let plan = reconciler.plan(&address, desired.get(&address)).await?;
            tracing::info!(
                "{}: {:?} ({} change(s))",
                address,
                plan.action,
                plan.changes.len()
            );
            for change in &plan.changes {
                tracing::info!(
                    "  {}{}",
                    change.name,
                    if change.forces_replacement {
                        " (forces replacement)"
                    } else {
                        ""
                    }
                );
            }
        }
        return Ok(0);
    }

    let ctx = Context::new();
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling in-flight calls");
                ctx.cancel();
            }
        });
    }

    let reports = reconciler.apply(&ctx, &desired).await?;

    let mut failed = 0;
    for report in &reports {
        match &report.result {
            Ok(result) => {
                tracing::info!("{}: {:?}", report.address, result.outcome);
                for warning in &result.warnings {
                    tracing::warn!("{}: {}", report.address, warning);
                }
            }
            Err(_) => failed += 1,
        }
    }

    tracing::info!(
        "Reconciled {} resource(s), state serial {}",
        reports.len(),
        store.serial().await
    );
    Ok(failed)
}
