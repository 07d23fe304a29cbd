//! Configuration display command.

use console::style;

use staycompare::config::Config;

/// Print the effective configuration after defaults and env overrides.
pub fn cmd_config(config: &Config, json: bool) -> anyhow::Result<()> {
    match &config.source_path {
        Some(path) => eprintln!("{} {}", style("Config:").bold(), path.display()),
        None => eprintln!("{} (defaults)", style("Config:").bold()),
    }

    let mut shown = config.clone();
    for channel in shown.channels.values_mut() {
        if channel.api_key.is_some() {
            channel.api_key = Some("********".to_string());
        }
    }

    let rendered = if json {
        serde_json::to_string_pretty(&shown)?
    } else {
        toml::to_string_pretty(&shown)?
    };
    println!("{}", rendered);
    Ok(())
}
