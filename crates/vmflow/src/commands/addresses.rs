use super::Context;
use colored::Colorize;
use vmflow_pipeline::exit_code;

/// Print the addresses of the current deployment
pub async fn handle(ctx: &Context, json: bool) -> anyhow::Result<i32> {
    let orchestrator = ctx.orchestrator(false)?;
    let book = match orchestrator.addresses().await {
        Ok(book) => book,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(hint) = e.remediation() {
                eprintln!("  {} {}", "→".cyan(), hint);
            }
            return Ok(e.exit_code());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&book)?);
        return Ok(exit_code::OK);
    }

    let show = |label: &str, value: &Option<String>| {
        println!(
            "  {:<14} {}",
            label,
            value.as_deref().unwrap_or("-").cyan()
        );
    };
    println!("{}", "Addresses:".bold());
    show("public", &book.public_ip);
    show("wireguard", &book.wireguard_ip);
    show("tailscale", &book.tailscale_ip);
    show("connection", &book.connection);
    show("gateway", &book.gateway_url);

    let records = book.dns_records();
    if !records.is_empty() {
        println!();
        println!("{}", "DNS records to create:".bold());
        for record in records {
            println!("  {:<20} {:<4} {}", record.name, record.kind, record.value);
        }
    }

    if let Ok(Some(last)) = orchestrator.last_deployment().await {
        println!();
        println!(
            "Last deployment: {} ({})",
            last.deployed_at.to_rfc3339(),
            last.roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(exit_code::OK)
}
