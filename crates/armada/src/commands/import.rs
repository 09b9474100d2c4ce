use crate::output;
use crate::workspace::{self, Session};
use armada_config::Config;
use colored::Colorize;

pub async fn handle(
    config: &Config,
    name: &str,
    id: &str,
    kind: Option<&str>,
) -> anyhow::Result<()> {
    let declared = config.manifest.resource(name);
    let kind = match (kind, declared) {
        (Some(kind), Some(declared)) if kind != declared.kind => anyhow::bail!(
            "{} is declared as {} in the configuration, not {}",
            name,
            declared.kind,
            kind
        ),
        (Some(kind), _) => kind.to_string(),
        (None, Some(declared)) => declared.kind.clone(),
        (None, None) => anyhow::bail!(
            "{} is not declared in the configuration; pass its type with --type",
            name
        ),
    };

    let provisioner = workspace::provisioner(config)?;
    let mut session = Session::open(config).await?;

    println!("Importing {} as {}...", id.cyan(), name.cyan());
    let tracked = provisioner
        .import(name, &kind, id, &mut session.state)
        .await?;
    session.close().await?;

    println!("{} Imported {}", "✓".green(), tracked.id);
    output::print_attributes(&tracked.observed);

    if declared.is_none() {
        println!();
        println!(
            "{}",
            format!(
                "{} is not in the configuration yet; the next apply will delete it unless it is declared",
                name
            )
            .yellow()
        );
    }
    Ok(())
}
