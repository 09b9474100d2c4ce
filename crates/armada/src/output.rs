//! Terminal rendering of plans and results

use armada_cloud::{ActionType, ApplyResult, FieldPolicy, ObservedState, Plan, RefreshReport, Value};
use colored::Colorize;

pub fn print_plan(plan: &Plan) {
    println!();
    if !plan.has_changes {
        println!("{}", "No changes. Remote objects match the configuration.".green());
        return;
    }

    for action in &plan.actions {
        let (symbol, label) = match action.action_type {
            ActionType::Create => ("+".green(), "create".green()),
            ActionType::Update => ("~".yellow(), "update".yellow()),
            ActionType::Replace => ("-/+".red(), "replace".red()),
            ActionType::Delete => ("-".red(), "delete".red()),
            ActionType::NoOp => continue,
        };
        println!(
            "{} {} {} ({})",
            symbol,
            action.name.bold(),
            label,
            action.kind.dimmed()
        );
        if let Some(id) = &action.resource_id {
            println!("    {}", id.dimmed());
        }
        for change in action.changes.iter() {
            let marker = if change.policy == FieldPolicy::ForcesReplacement {
                " (forces replacement)".red().to_string()
            } else {
                String::new()
            };
            println!(
                "    {}: {} → {}{}",
                change.field,
                render(&change.before),
                render(&change.after),
                marker
            );
        }
    }

    println!();
    println!("{} {}", "Plan:".bold(), plan.summary());
}

pub fn print_apply_result(result: &ApplyResult) {
    println!();
    for item in &result.succeeded {
        println!("  {} {}: {}", "✓".green(), item.name.cyan(), item.message);
    }
    for item in &result.warnings {
        println!("  {} {}: {}", "⚠".yellow(), item.name.cyan(), item.message);
    }
    for item in &result.failed {
        let error = item.error.as_deref().unwrap_or(&item.message);
        println!("  {} {}: {}", "✗".red(), item.name.cyan(), error);
    }

    println!();
    let summary = format!(
        "{} succeeded, {} warnings, {} failed in {:.1}s",
        result.succeeded.len(),
        result.warnings.len(),
        result.failed.len(),
        result.duration_ms as f64 / 1000.0
    );
    if result.is_success() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

pub fn print_refresh_report(report: &RefreshReport) {
    for name in &report.refreshed {
        println!("  {} {}", "✓".green(), name.cyan());
    }
    for name in &report.removed {
        println!("  {} {} (no longer exists, removed from state)", "-".yellow(), name.cyan());
    }
    for (name, error) in &report.failed {
        println!("  {} {}: {}", "✗".red(), name.cyan(), error);
    }
}

pub fn print_attributes(attributes: &ObservedState) {
    for (name, value) in attributes {
        println!("    {} = {}", name, render(value));
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "(unset)".dimmed().to_string(),
        other => other.to_string(),
    }
}
