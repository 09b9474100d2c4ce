use crate::output;
use crate::workspace::{self, Session};
use armada_config::Config;
use colored::Colorize;

pub async fn handle(config: &Config) -> anyhow::Result<()> {
    let provisioner = workspace::provisioner(config)?;
    let mut session = Session::open(config).await?;

    if session.state.resources.is_empty() {
        session.close().await?;
        println!("{}", "No tracked resources.".yellow());
        return Ok(());
    }

    println!("{}", "Refreshing state...".blue());
    let report = provisioner.refresh(&mut session.state).await;
    session.close().await?;

    output::print_refresh_report(&report);
    if !report.failed.is_empty() {
        anyhow::bail!("{} resources could not be refreshed", report.failed.len());
    }
    Ok(())
}
