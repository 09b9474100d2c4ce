//! Wiring between the loaded configuration, the ARM client and the state file

use anyhow::Context;
use armada_cloud::{CloudContext, GlobalState, Provisioner, StateLock, StateManager};
use armada_cloud_azure::{ArmClient, ArmConfig};
use armada_config::Config;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => armada_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => armada_config::load_discovered()?,
    };
    tracing::info!(path = %config.path.display(), "Loaded configuration");
    Ok(config)
}

/// Build a provisioner from settings; cancelled on Ctrl-C
pub fn provisioner(config: &Config) -> anyhow::Result<Provisioner> {
    let settings = &config.settings;
    let subscription_id = settings.subscription_id()?;

    let arm = ArmConfig::from_env(&settings.azure.token_env)?
        .with_endpoint(&settings.azure.endpoint)
        .with_retry(settings.retry.clone());
    let client = ArmClient::new(arm)?;

    let mut ctx = CloudContext::new(
        Arc::new(client),
        subscription_id,
        armada_cloud_azure::registry(),
    )
    .with_backoff(settings.backoff.clone())
    .with_stability(settings.stability.clone());
    if let Some(timeouts) = settings.timeouts {
        ctx = ctx.with_timeouts(timeouts);
    }

    Ok(Provisioner::new(Arc::new(ctx))
        .with_cancellation(cancel_on_ctrl_c())
        .with_unconfirmed_delete(settings.unconfirmed_delete))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "Interrupted; stopping in-flight operations and saving state".yellow()
            );
            child.cancel();
        }
    });
    token
}

/// Locked access to the state file for the duration of one command
pub struct Session {
    pub state: GlobalState,
    manager: StateManager,
    lock: StateLock,
}

impl Session {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let manager = StateManager::new(config.project_root());
        let lock = manager.acquire_lock().await?;
        let state = manager.load().await?;
        Ok(Self {
            state,
            manager,
            lock,
        })
    }

    /// Save the state and release the lock
    pub async fn close(self) -> anyhow::Result<()> {
        self.manager
            .save(&self.state)
            .await
            .with_context(|| format!("failed to save {}", self.manager.state_path().display()))?;
        self.lock.release().await?;
        Ok(())
    }
}

/// Read the state without taking the lock
pub async fn read_state(config: &Config) -> anyhow::Result<GlobalState> {
    Ok(StateManager::new(config.project_root()).load().await?)
}
