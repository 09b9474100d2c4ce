use crate::output;
use crate::workspace;
use armada_cloud::{GlobalState, Plan, Provisioner};
use armada_config::Config;
use colored::Colorize;

pub async fn handle(config: &Config, refresh: bool) -> anyhow::Result<()> {
    let provisioner = workspace::provisioner(config)?;

    // planning never writes the state
    let mut state = workspace::read_state(config).await?;
    let plan = prepare(&provisioner, config, &mut state, refresh).await?;
    output::print_plan(&plan);
    Ok(())
}

/// Optionally refresh the state, then compare it with the configuration
pub async fn prepare(
    provisioner: &Provisioner,
    config: &Config,
    state: &mut GlobalState,
    refresh: bool,
) -> anyhow::Result<Plan> {
    if refresh && !state.resources.is_empty() {
        println!("{}", "Refreshing state...".blue());
        let report = provisioner.refresh(state).await;
        output::print_refresh_report(&report);
        if !report.failed.is_empty() {
            anyhow::bail!(
                "{} resources could not be refreshed; fix the errors above or use --no-refresh",
                report.failed.len()
            );
        }
    }

    Ok(provisioner.plan(&config.manifest.resources, state)?)
}
