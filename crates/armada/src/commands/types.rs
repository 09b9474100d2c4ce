use colored::Colorize;

pub fn handle() {
    println!("{}", "Supported resource types:".bold());
    for name in armada_cloud_azure::registry().names() {
        println!("  • {}", name.cyan());
    }
}
