use console::style;

use crate::error::Result;
use crate::provisioner::Provisioner;
use crate::state::SnapshotState;

pub async fn create(provisioner: &Provisioner, server_id: &str) -> Result<()> {
    println!("{} Snapshotting {}...", style("→").cyan().bold(), style(server_id).cyan());

    let record = provisioner.snapshot(server_id).await?;

    println!(
        "\n{} Snapshot created: {}",
        style("✓").green().bold(),
        style(&record.id).cyan()
    );
    println!("  Server: {}", style(&record.server_name).dim());

    Ok(())
}

pub async fn list(snapshots: &SnapshotState) -> Result<()> {
    let mut records = snapshots.list_all().await;
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if records.is_empty() {
        println!("{}", style("No snapshots found.").dim());
        return Ok(());
    }

    println!("{}", style("Snapshots").bold().cyan());
    println!();

    for r in records {
        println!("  {} {}", style(&r.id).cyan(), style(&r.server_name).white());
        println!(
            "    Game: {}   Region: {}   Created: {}",
            style(&r.game).dim(),
            style(&r.region).dim(),
            style(r.created_at.format("%Y-%m-%d %H:%M")).dim()
        );
    }

    Ok(())
}

pub async fn delete(provisioner: &Provisioner, id: &str) -> Result<()> {
    println!("{} Deleting snapshot {}...", style("→").yellow().bold(), style(id).cyan());

    provisioner.delete_snapshot(id).await?;

    println!("{} Snapshot deleted.", style("✓").green().bold());

    Ok(())
}
