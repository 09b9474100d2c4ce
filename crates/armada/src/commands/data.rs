use crate::output;
use crate::workspace;
use armada_config::Config;
use colored::Colorize;

pub async fn handle(config: &Config, name: Option<&str>) -> anyhow::Result<()> {
    let sources: Vec<_> = config
        .manifest
        .data
        .iter()
        .filter(|source| name.is_none_or(|name| source.name == name))
        .collect();

    if let Some(name) = name
        && sources.is_empty()
    {
        anyhow::bail!("data source {} is not declared in the configuration", name);
    }
    if sources.is_empty() {
        println!("{}", "No data sources declared.".yellow());
        return Ok(());
    }

    let provisioner = workspace::provisioner(config)?;
    let mut failed = 0;

    for source in sources {
        println!();
        match provisioner.lookup(&source.kind, &source.desired).await {
            Ok(tracked) => {
                println!("{} {}", "✓".green(), source.name.bold());
                println!("    {}", tracked.id.to_string().cyan());
                output::print_attributes(&tracked.observed);
            }
            Err(e) => {
                println!("{} {}: {}", "✗".red(), source.name.bold(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} data sources could not be read", failed);
    }
    Ok(())
}
