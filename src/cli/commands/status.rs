//! `gscp status` — list servers, or describe one in detail.

use console::style;

use crate::error::{GscpError, Result};
use crate::reconciler::Reconciler;
use crate::state::records::ServerStatus;
use crate::state::ServerState;
use crate::utils::{format_elapsed, truncate};

pub async fn execute(servers: &ServerState, reconciler: &Reconciler, id: Option<&str>, detailed: bool) -> Result<()> {
    reconciler.auto_reconcile().await;

    match id {
        Some(id) => show_one(servers, id).await,
        None => list_all(servers, detailed).await,
    }
}

async fn list_all(servers: &ServerState, detailed: bool) -> Result<()> {
    let mut records = servers.list_all().await;
    records.sort_by(|a, b| a.name.cmp(&b.name));

    if records.is_empty() {
        println!("{}", style("No servers.").dim());
        println!("Run {} to create one.", style("gscp launch <game>").cyan());
        return Ok(());
    }

    println!(
        "{:<14} {:<18} {:<10} {:<10} {:<16} {:<10}",
        style("ID").bold(),
        style("NAME").bold(),
        style("GAME").bold(),
        style("STATUS").bold(),
        style("IP").bold(),
        style("REGION").bold(),
    );
    for r in &records {
        println!(
            "{:<14} {:<18} {:<10} {:<10} {:<16} {:<10}",
            truncate(&r.id, 12),
            r.name,
            r.game,
            format_status(r.status),
            if r.public_ip.is_empty() { "-" } else { &r.public_ip },
            r.region,
        );
    }

    if detailed {
        println!();
        for r in &records {
            println!("{}", style(&r.name).bold());
            println!("  id:        {}", r.id);
            println!("  instance:  {}", r.instance_id);
            println!("  container: {}", r.container_name);
            println!("  ports:     {}", r.ports.keys().cloned().collect::<Vec<_>>().join(", "));
            if !r.eip_allocation_id.is_empty() {
                println!("  pinned ip: {} ({})", r.eip_public_ip, r.eip_allocation_id);
            }
            println!();
        }
    }

    Ok(())
}

async fn show_one(servers: &ServerState, id: &str) -> Result<()> {
    let record = servers
        .get_by_name_or_id(id)
        .await
        .ok_or_else(|| GscpError::CloudNotFound(id.to_string()))?;

    println!(
        "{} {} {}",
        style("●").green().bold(),
        style(&record.name).white().bold(),
        style(format!("({})", &record.id)).dim()
    );
    println!();
    println!("  Game:       {}", record.game);
    println!("  Status:     {}", format_status(record.status));
    println!("  Region:     {}", record.region);
    println!(
        "  Public IP:  {}",
        if record.public_ip.is_empty() { "-".to_string() } else { record.public_ip.clone() }
    );
    println!("  Instance:   {}", record.instance_id);
    println!("  Container:  {}", record.container_name);
    println!(
        "  Launched:   {} ({} ago)",
        record.launch_time.format("%Y-%m-%d %H:%M:%S UTC"),
        format_elapsed(record.launch_time)
    );
    if !record.ports.is_empty() {
        println!("  Ports:      {}", record.ports.keys().cloned().collect::<Vec<_>>().join(", "));
    }
    if !record.eip_allocation_id.is_empty() {
        println!("  Pinned IP:  {} ({})", record.eip_public_ip, record.eip_allocation_id);
    }

    Ok(())
}

fn format_status(status: ServerStatus) -> console::StyledObject<&'static str> {
    match status {
        ServerStatus::Running => style("running").green(),
        ServerStatus::Launching => style("launching").yellow(),
        ServerStatus::Stopped => style("stopped").yellow(),
        ServerStatus::Paused => style("paused").red(),
    }
}
