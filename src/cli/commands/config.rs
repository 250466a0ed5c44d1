use console::style;

use crate::config::{AppConfig, RconSyncMode};
use crate::error::Result;

pub async fn show() -> Result<()> {
    let config_path = AppConfig::config_path()?;

    if !config_path.exists() {
        println!("{}", style("No configuration file found, using defaults.").dim());
        println!();
    }

    let config = AppConfig::load()?;

    println!("{}", style("Current Configuration").bold().cyan());
    println!();
    println!("  Tool name:     {}", style(&config.tool_name).white());
    println!("  Region:        {}", style(&config.region).white());
    println!("  SSH user:      {}", style(&config.ssh_user).white());
    println!("  SSH CIDR:      {}", style(&config.ssh_cidr).white());
    println!(
        "  RCON sync:     {}",
        style(match config.rcon_sync {
            RconSyncMode::Tag => "tag",
            RconSyncMode::ParameterStore => "parameter-store",
        })
        .white()
    );
    print!("  State dir:     ");
    match &config.state_dir {
        Some(d) => println!("{}", style(d).white()),
        None => println!("{}", style(format!("{} (default)", config.state_dir()?.display())).dim()),
    }
    if config.extra_regions.is_empty() {
        println!("  Extra regions: {}", style("(none)").dim());
    } else {
        println!("  Extra regions: {}", style(config.extra_regions.join(", ")).white());
    }
    println!();
    println!("Config file: {}", style(config_path.display()).dim());

    Ok(())
}

pub async fn set(key: String, value: String) -> Result<()> {
    let mut config = AppConfig::load().unwrap_or_default();

    match key.as_str() {
        "tool_name" | "tool-name" => config.tool_name = value.clone(),
        "region" => config.region = value.clone(),
        "ssh_user" | "ssh-user" => config.ssh_user = value.clone(),
        "ssh_cidr" | "ssh-cidr" => config.ssh_cidr = value.clone(),
        "rcon_sync" | "rcon-sync" => {
            config.rcon_sync = match value.as_str() {
                "tag" => RconSyncMode::Tag,
                "parameter-store" | "parameter_store" => RconSyncMode::ParameterStore,
                _ => {
                    println!("{} rcon_sync must be 'tag' or 'parameter-store'", style("!").yellow().bold());
                    return Ok(());
                }
            };
        }
        "state_dir" | "state-dir" => config.state_dir = Some(value.clone()),
        "extra_regions" | "extra-regions" => {
            config.extra_regions = value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        _ => {
            println!("{} Unknown config key: {}", style("!").yellow().bold(), style(&key).red());
            println!("\nAvailable keys:");
            println!("  tool_name, region, ssh_user, ssh_cidr, rcon_sync,");
            println!("  state_dir, extra_regions (comma-separated)");
            return Ok(());
        }
    }

    config.save()?;

    println!("{} Set {} = {}", style("\u{2713}").green().bold(), style(&key).cyan(), style(&value).white());

    Ok(())
}

pub async fn edit() -> Result<()> {
    let config_path = AppConfig::config_path()?;

    if !config_path.exists() {
        AppConfig::default().save()?;
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

    std::process::Command::new(&editor).arg(&config_path).status()?;

    Ok(())
}
