//! `gscp destroy|destroy-all|pause|resume|stop|pin-ip|unpin-ip`.

use console::style;

use crate::error::Result;
use crate::provisioner::Provisioner;

pub async fn destroy(provisioner: &Provisioner, id: &str) -> Result<()> {
    provisioner.destroy(id).await?;
    println!("{} Destroyed {}", style("✓").green().bold(), style(id).cyan());
    Ok(())
}

pub async fn destroy_all(provisioner: &Provisioner) -> Result<()> {
    provisioner.destroy_all().await?;
    println!("{} Destroyed all servers.", style("✓").green().bold());
    Ok(())
}

pub async fn pause(provisioner: &Provisioner, id: &str) -> Result<()> {
    provisioner.pause(id).await?;
    println!("{} Paused {}", style("✓").green().bold(), style(id).cyan());
    Ok(())
}

pub async fn resume(provisioner: &Provisioner, id: &str) -> Result<()> {
    provisioner.resume(id).await?;
    println!("{} Resumed {}", style("✓").green().bold(), style(id).cyan());
    Ok(())
}

pub async fn stop(provisioner: &Provisioner, id: &str) -> Result<()> {
    provisioner.stop_container(id).await?;
    println!("{} Stopped container on {}", style("✓").green().bold(), style(id).cyan());
    Ok(())
}

pub async fn pin_ip(provisioner: &Provisioner, id: &str) -> Result<()> {
    provisioner.pin_ip(id).await?;
    println!("{} Pinned an elastic IP to {}", style("✓").green().bold(), style(id).cyan());
    Ok(())
}

pub async fn unpin_ip(provisioner: &Provisioner, id: &str) -> Result<()> {
    provisioner.unpin_ip(id).await?;
    println!("{} Released the pinned IP from {}", style("✓").green().bold(), style(id).cyan());
    Ok(())
}
