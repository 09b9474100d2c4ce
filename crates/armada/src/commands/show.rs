use crate::output;
use crate::workspace;
use armada_config::Config;
use colored::Colorize;

pub async fn handle(config: &Config, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let state = workspace::read_state(config).await?;

    if let Some(name) = name
        && state.get_resource(name).is_none()
    {
        anyhow::bail!("{} is not tracked in the state", name);
    }

    let resources: Vec<_> = state
        .resources
        .iter()
        .filter(|(key, _)| name.is_none_or(|name| key.as_str() == name))
        .collect();

    if json {
        let map: std::collections::BTreeMap<_, _> = resources.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if resources.is_empty() {
        println!("{}", "No tracked resources.".yellow());
        return Ok(());
    }

    for (key, resource) in resources {
        println!();
        println!(
            "{} ({}, {})",
            key.bold(),
            resource.kind.dimmed(),
            resource.status
        );
        println!("    {}", resource.id.cyan());
        output::print_attributes(&resource.attributes);
    }
    Ok(())
}
