use crate::output;
use crate::workspace::{self, Session};
use armada_config::Config;
use colored::Colorize;

pub async fn handle(config: &Config, targets: &[String], yes: bool) -> anyhow::Result<()> {
    let provisioner = workspace::provisioner(config)?;
    let mut session = Session::open(config).await?;

    let plan = provisioner.plan_destroy(&session.state, targets)?;
    output::print_plan(&plan);

    if !plan.has_changes {
        session.close().await?;
        return Ok(());
    }

    if !yes {
        session.close().await?;
        println!();
        println!(
            "{}",
            "Warning: the objects above will be deleted from Azure.".yellow()
        );
        println!("Run again with --yes to destroy them");
        return Ok(());
    }

    println!();
    println!("{}", "Destroying...".red());
    let result = provisioner.apply(&plan, &mut session.state).await;
    session.close().await?;

    output::print_apply_result(&result);
    if !result.is_success() {
        anyhow::bail!("{} resources could not be destroyed", result.failed.len());
    }
    Ok(())
}
