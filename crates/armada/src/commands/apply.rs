use crate::commands::plan;
use crate::output;
use crate::workspace::{self, Session};
use armada_config::Config;
use colored::Colorize;

pub async fn handle(config: &Config, yes: bool, refresh: bool) -> anyhow::Result<()> {
    let provisioner = workspace::provisioner(config)?;
    let mut session = Session::open(config).await?;

    let plan = plan::prepare(&provisioner, config, &mut session.state, refresh).await?;
    output::print_plan(&plan);

    if !plan.has_changes {
        session.close().await?;
        return Ok(());
    }

    if !yes {
        session.close().await?;
        println!();
        println!("{}", "Nothing was changed.".yellow());
        println!("Run again with --yes to apply these changes");
        return Ok(());
    }

    println!();
    println!("{}", "Applying changes...".blue());
    let result = provisioner.apply(&plan, &mut session.state).await;
    session.close().await?;

    output::print_apply_result(&result);
    if !result.is_success() {
        anyhow::bail!("{} of the planned actions failed", result.failed.len());
    }
    Ok(())
}
