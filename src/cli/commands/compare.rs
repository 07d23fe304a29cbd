//! Rate comparison command.

use std::time::Duration;

use chrono::NaiveDate;
use console::style;
use tokio::sync::broadcast::error::TryRecvError;

use staycompare::events::ServiceEvent;
use staycompare::models::{Channel, PartyComposition, RateComparisonResult, RateQuote};
use staycompare::{ComparisonError, Config, FetchOptions, RateService};

use crate::cli::icons;

pub struct CompareArgs {
    pub property: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub channels: Vec<Channel>,
    pub party: PartyComposition,
    pub currency: Option<String>,
    pub timeout_secs: Option<u64>,
    pub no_cache: bool,
    pub json: bool,
}

impl CompareArgs {
    fn options(&self) -> FetchOptions {
        FetchOptions {
            party: self.party,
            timeout: self.timeout_secs.map(Duration::from_secs),
            bypass_cache: self.no_cache,
            currency: self.currency.clone(),
        }
    }
}

/// Compare rates for one property and print the result.
pub async fn cmd_compare(config: Config, args: CompareArgs) -> anyhow::Result<()> {
    let service = RateService::from_config(config)?;
    let mut events = service.events().subscribe();

    if !args.json {
        println!(
            "{} Comparing {} for {} to {}",
            icons::info(),
            style(&args.property).cyan(),
            args.check_in,
            args.check_out
        );
    }

    let outcome = service
        .get_comparison(
            &args.property,
            &args.channels,
            args.check_in,
            args.check_out,
            &args.options(),
        )
        .await;

    // Per-channel failures are reported through events, not the result.
    loop {
        match events.try_recv() {
            Ok(ServiceEvent::ChannelFetched {
                channel,
                success: false,
                error_tag,
                attempts,
                ..
            }) => {
                eprintln!(
                    "{} {} failed ({}, {} attempt{})",
                    icons::warn(),
                    channel.display_name(),
                    error_tag.as_deref().unwrap_or("unknown"),
                    attempts,
                    if attempts == 1 { "" } else { "s" }
                );
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    let result = match outcome {
        Ok(result) => result,
        Err(ComparisonError::AllChannelsFailed(failures)) => {
            for failure in &failures {
                eprintln!("{} {}", icons::error(), failure);
            }
            anyhow::bail!("no channel returned a quote for {}", args.property);
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_comparison(&result);
    }
    Ok(())
}

fn print_comparison(result: &RateComparisonResult) {
    let best_channel = result.best_quote.as_ref().map(|q| q.channel);

    println!();
    println!(
        "  {:<14} {:>10} {:>10} {:>10} {:>10} {:>10}",
        style("Channel").bold(),
        style("Base").bold(),
        style("Fees").bold(),
        style("Total").bold(),
        style("Nightly").bold(),
        style("Currency").bold()
    );
    for quote in &result.quotes {
        print_quote(quote, best_channel == Some(quote.channel));
    }
    println!();

    match (&result.best_quote, &result.savings) {
        (Some(best), Some(savings)) => println!(
            "{} Book on {}: {} {} cheaper ({:.2}%)",
            icons::success(),
            style(best.channel.display_name()).green().bold(),
            format_money(savings.amount),
            best.currency,
            savings.percentage
        ),
        (Some(best), None) => println!(
            "{} Only {} has availability",
            icons::success(),
            style(best.channel.display_name()).green()
        ),
        (None, _) => println!(
            "{} No channel has these dates available",
            icons::warn()
        ),
    }
}

fn print_quote(quote: &RateQuote, best: bool) {
    let nightly = quote
        .effective_nightly_rate()
        .map(format_money)
        .unwrap_or_else(|| "-".to_string());
    let name = if quote.availability {
        quote.channel.display_name().to_string()
    } else {
        format!("{} (n/a)", quote.channel.display_name())
    };

    println!(
        "{} {:<14} {:>10} {:>10} {:>10} {:>10} {:>10}",
        icons::quote_marker(best, quote.availability),
        name,
        format_money(quote.base_price),
        format_money(quote.fees.total()),
        format_money(quote.total_price),
        nightly,
        quote.currency
    );
}

/// Two decimals with thousands separators.
fn format_money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_money_with_grouping() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(12.5), "12.50");
        assert_eq!(format_money(1234.567), "1,234.57");
        assert_eq!(format_money(1_000_000.0), "1,000,000.00");
        assert_eq!(format_money(-45.0), "-45.00");
    }

    #[test]
    fn options_carry_overrides() {
        let args = CompareArgs {
            property: "cabin".to_string(),
            check_in: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            channels: vec![],
            party: PartyComposition::default(),
            currency: Some("eur".to_string()),
            timeout_secs: Some(5),
            no_cache: true,
            json: false,
        };
        let options = args.options();
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert!(options.bypass_cache);
        assert_eq!(options.currency.as_deref(), Some("eur"));
    }
}
