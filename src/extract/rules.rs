//! Ordered, declarative price-extraction rules.
//!
//! Every page-based channel shares one rule list. A rule is a labelled regex
//! bound to the [`PriceField`] it fills; rules run in order and the first rule
//! to fill a field wins. Operator rules from configuration run before the
//! built-in list.

use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Amount token: digits with optional thousands separators and decimals.
const AMOUNT: &str = r"\d(?:[\d,.]*\d)?";

/// Non-numeric text allowed between a label and its amount (symbols, codes).
const GAP: &str = r"[^\d\n]{0,24}?";

/// Qualifiers marking an amount that excludes taxes.
const PRE_TAX: &str = r"\b(?:before|excl|excluding|without)\b";

/// Qualifiers marking taxes as already folded into another amount.
const TAX_NOT_ITEMIZED: &str = r"\b(?:before|excl|excluding|without|incl|included|includes|including)\b";

/// Quote field a rule fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Accommodation subtotal.
    Base,
    /// `nights` × `rate`, filling the base price.
    NightlyRate,
    Cleaning,
    Service,
    Taxes,
    Other,
    Discount,
    Total,
}

/// A rule as written in configuration.
///
/// `pattern` is matched case-insensitively. It must capture the amount in a
/// group named `amount`, except for [`PriceField::NightlyRate`] rules which
/// capture `nights` and `rate`.
///
/// `reject`, when set, is matched case-insensitively against the line text
/// leading up to and including a match; a hit skips that match and the rule
/// moves on to the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub label: String,
    pub pattern: String,
    pub field: PriceField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject: Option<String>,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub label: String,
    pub field: PriceField,
    pub regex: Regex,
    pub reject: Option<Regex>,
}

fn compile_pattern(label: &str, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::Invalid(format!("rule '{}': {}", label, e)))
}

impl Rule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, ConfigError> {
        let regex = compile_pattern(&spec.label, &spec.pattern)?;
        let reject = spec
            .reject
            .as_deref()
            .map(|pattern| compile_pattern(&spec.label, pattern))
            .transpose()?;

        let names: Vec<&str> = regex.capture_names().flatten().collect();
        let required: &[&str] = match spec.field {
            PriceField::NightlyRate => &["nights", "rate"],
            _ => &["amount"],
        };
        if let Some(missing) = required.iter().find(|n| !names.contains(n)) {
            return Err(ConfigError::Invalid(format!(
                "rule '{}' must capture a group named `{}`",
                spec.label, missing
            )));
        }

        Ok(Self {
            label: spec.label.clone(),
            field: spec.field,
            regex,
            reject,
        })
    }

    /// Value of the first acceptable match of this rule in `text`.
    pub fn apply(&self, text: &str) -> Option<f64> {
        self.regex
            .captures_iter(text)
            .filter(|caps| !self.rejects(text, caps))
            .find_map(|caps| self.value(&caps))
    }

    fn value(&self, caps: &Captures<'_>) -> Option<f64> {
        match self.field {
            PriceField::NightlyRate => {
                let nights: f64 = caps.name("nights")?.as_str().parse().ok()?;
                let rate = parse_amount(caps.name("rate")?.as_str())?;
                Some(nights * rate)
            }
            _ => parse_amount(caps.name("amount")?.as_str()),
        }
    }

    fn rejects(&self, text: &str, caps: &Captures<'_>) -> bool {
        let Some(whole) = caps.get(0) else {
            return true;
        };

        // "3 nights" is a stay length, never a money amount.
        if let Some(amount) = caps.name("amount") {
            let after = text[amount.end()..].trim_start();
            if after.get(..5).is_some_and(|w| w.eq_ignore_ascii_case("night")) {
                return true;
            }
        }

        let Some(reject) = &self.reject else {
            return false;
        };
        let line_start = text[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
        reject.is_match(&text[line_start..whole.end()])
    }
}

/// Built-in rules, in evaluation order.
pub fn builtin_specs() -> Vec<RuleSpec> {
    let rule = |label: &str, pattern: String, field| RuleSpec {
        label: label.to_string(),
        pattern,
        field,
        reject: None,
    };
    let guarded = |label: &str, pattern: String, field, reject: &str| RuleSpec {
        reject: Some(reject.to_string()),
        ..rule(label, pattern, field)
    };
    vec![
        rule(
            "nights_x_rate",
            format!(r"(?P<nights>\d+)\s*nights?\s*[x×]\s*[^\d\n]{{0,8}}?(?P<rate>{AMOUNT})"),
            PriceField::NightlyRate,
        ),
        rule(
            "rate_x_nights",
            format!(r"(?P<rate>{AMOUNT})\s*[x×]\s*(?P<nights>\d+)\s*nights?"),
            PriceField::NightlyRate,
        ),
        rule(
            "pre_tax_total",
            format!(r"\btotal\s+(?:before|excl(?:uding|\.)?|without)\s+tax(?:es)?\b{GAP}(?P<amount>{AMOUNT})"),
            PriceField::Base,
        ),
        rule(
            "subtotal",
            format!(r"\b(?:subtotal|base\s+price|accommodation)\b{GAP}(?P<amount>{AMOUNT})"),
            PriceField::Base,
        ),
        rule(
            "cleaning_fee",
            format!(r"\bcleaning\s+fee\b{GAP}(?P<amount>{AMOUNT})"),
            PriceField::Cleaning,
        ),
        rule(
            "service_fee",
            format!(r"\b(?:service|booking|guest)\s+fee\b{GAP}(?P<amount>{AMOUNT})"),
            PriceField::Service,
        ),
        guarded(
            "taxes",
            format!(r"\btax(?:es)?\b{GAP}(?P<amount>{AMOUNT})"),
            PriceField::Taxes,
            TAX_NOT_ITEMIZED,
        ),
        rule(
            "discount",
            format!(r"\bdiscount\b{GAP}(?P<amount>{AMOUNT})"),
            PriceField::Discount,
        ),
        guarded(
            "total",
            format!(r"\btotal\b{GAP}(?P<amount>{AMOUNT})"),
            PriceField::Total,
            PRE_TAX,
        ),
    ]
}

/// Compiled rule list plus currency detection.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    currency_code: Regex,
}

impl RuleSet {
    /// Compile `extra` rules followed by the built-in list.
    pub fn new(extra: &[RuleSpec]) -> Result<Self, ConfigError> {
        let rules = extra
            .iter()
            .cloned()
            .chain(builtin_specs())
            .map(|spec| Rule::compile(&spec))
            .collect::<Result<Vec<_>, _>>()?;

        let currency_code = Regex::new(r"\b(USD|EUR|GBP|CAD|AUD|NZD|CHF|JPY|MXN)\b")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self {
            rules,
            currency_code,
        })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(&[])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// ISO code or currency symbol found in `text`.
    pub fn detect_currency(&self, text: &str) -> Option<String> {
        if let Some(m) = self.currency_code.find(text) {
            return Some(m.as_str().to_string());
        }
        text.chars().find_map(|c| match c {
            '$' => Some("USD".to_string()),
            '€' => Some("EUR".to_string()),
            '£' => Some("GBP".to_string()),
            _ => None,
        })
    }
}

/// Parse a money amount, accepting `1,234.56` and `1.234,56`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            if cleaned.len() - comma - 1 <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
