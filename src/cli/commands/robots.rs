//! robots.txt inspection command.

use std::sync::Arc;

use console::style;

use staycompare::config::Config;
use staycompare::ethics::{EthicalGuard, IdentityPool};
use staycompare::http_client::HttpClient;
use staycompare::models::Channel;

use crate::cli::icons;

/// Report whether `url` may be fetched and any crawl-delay it asks for.
pub async fn cmd_robots(config: &Config, url: &str, channel: Option<Channel>) -> anyhow::Result<()> {
    let mut policy = channel
        .map(|c| config.channel_config(c).ethics)
        .unwrap_or_default();
    // Inspection always consults robots.txt, even for channels that opt out.
    policy.respect_robots = true;

    let identities = Arc::new(IdentityPool::from_config(&config.identity));
    let guard = EthicalGuard::new(policy, identities.clone(), HttpClient::new()?);

    let allowed = guard.check_policy(url).await;
    if allowed {
        println!(
            "{} {} may fetch {}",
            icons::success(),
            style(identities.product_token()).cyan(),
            url
        );
    } else {
        println!(
            "{} robots.txt disallows {} for {}",
            icons::error(),
            url,
            style(identities.product_token()).cyan()
        );
    }

    match guard.crawl_delay(url).await {
        Some(delay) => println!("{} Crawl-delay: {:?}", icons::bullet(), delay),
        None => println!("{} No crawl-delay requested", icons::bullet()),
    }

    Ok(())
}
