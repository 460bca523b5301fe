use std::path::Path;

use anyhow::Result;
use console::style;

use notion_sync_core::config::SyncConfig;

use crate::output;
use crate::ConfigAction;

/// Execute a config subcommand against the config file at `path`
pub fn execute(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = if path.exists() {
                SyncConfig::from_file(path)?
            } else {
                SyncConfig::from_env()?
            };
            show(&config, path);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Reset => {
            if path.exists() {
                let backup = SyncConfig::backup(path)?;
                println!("Backed up existing config to {}", backup.display());
            }
            SyncConfig::reset(path)?;
            println!("{}", output::format_success("config reset to defaults"));
        }
        ConfigAction::Backup => {
            let backup = SyncConfig::backup(path)?;
            println!(
                "{}",
                output::format_success(&format!("backed up to {}", backup.display()))
            );
        }
    }
    Ok(())
}

fn show(config: &SyncConfig, path: &Path) {
    let source = if path.exists() { "file + env" } else { "defaults + env" };
    println!("{} ({} from {})", style("Configuration").bold(), source, path.display());
    println!("  sync_root:              {}", config.sync_root.display());
    println!("  database_url:           {}", config.database_url.display());
    println!("  sync_interval_secs:     {}", config.sync_interval_secs);
    println!("  max_file_size:          {} bytes", config.max_file_size);
    println!("  supported_formats:      {}", config.supported_formats.join(", "));
    println!("  rate_limit:             {} req/s", config.rate_limit);
    println!("  max_concurrent_uploads: {}", config.max_concurrent_uploads);
    println!("  retry_attempts:         {}", config.retry_attempts);
    println!("  retry_delay_secs:       {}", config.retry_delay_secs);
    println!(
        "  client_id:              {}",
        config.client_id.as_deref().unwrap_or("(unset)")
    );
    // The secret is never printed.
    println!(
        "  client_secret:          {}",
        if config.client_secret.is_some() { "(set)" } else { "(unset)" }
    );
}
