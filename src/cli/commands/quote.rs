//! Quote validation command.

use std::path::Path;

use tokio::io::AsyncReadExt;

use staycompare::normalize;

use crate::cli::icons;

/// Validate a quote document and print its normalized form.
pub async fn cmd_validate_quote(path: &Path) -> anyhow::Result<()> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(path).await?
    };

    let value: serde_json::Value = serde_json::from_str(&contents)?;
    match normalize::validate_json(value) {
        Ok(quote) => {
            eprintln!(
                "{} Valid {} quote for {}",
                icons::success(),
                quote.channel.display_name(),
                quote.property_id
            );
            println!("{}", serde_json::to_string_pretty(&quote)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", icons::error(), e);
            Err(e.into())
        }
    }
}
