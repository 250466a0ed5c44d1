//! `gscp launch` — allocate and boot a new server.

use std::collections::HashMap;
use std::path::PathBuf;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Result;
use crate::provisioner::{LaunchOptions, Provisioner};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    provisioner: &Provisioner,
    game: String,
    region: Option<String>,
    instance_type: Option<String>,
    name: Option<String>,
    config: Vec<String>,
    config_file: Option<PathBuf>,
    upload: Vec<String>,
    from_snapshot: Option<String>,
    pin_ip: bool,
) -> Result<()> {
    let mut config_overrides = HashMap::new();
    for kv in config {
        if let Some((k, v)) = kv.split_once('=') {
            config_overrides.insert(k.to_string(), v.to_string());
        }
    }

    let mut uploads = Vec::new();
    for spec in upload {
        if let Some((local, remote)) = spec.split_once(':') {
            uploads.push((PathBuf::from(local), remote.to_string()));
        }
    }

    let opts = LaunchOptions {
        game,
        region,
        instance_type,
        name,
        config_overrides,
        config_file,
        uploads,
        from_snapshot,
        pin_ip,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let bar = spinner.clone();
    let record = provisioner
        .launch(opts, Some(&move |msg: &str| bar.set_message(msg.to_string())))
        .await;

    spinner.finish_and_clear();

    let record = record?;

    println!(
        "{} Launched {} ({})",
        style("✓").green().bold(),
        style(&record.name).white().bold(),
        style(&record.id).dim()
    );
    println!("  IP:   {}", record.public_ip);
    if !record.ports.is_empty() {
        println!("  Ports: {}", record.ports.keys().cloned().collect::<Vec<_>>().join(", "));
    }
    if !record.rcon_password.is_empty() {
        println!("  RCON password: {}", style(&record.rcon_password).yellow());
    }
    println!();
    println!("  Connect: {}", style(format!("gscp ssh {}", record.id)).cyan());

    Ok(())
}
