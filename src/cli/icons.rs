//! Styled markers for CLI output.

use console::{style, StyledObject};

/// Green check mark.
pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

/// Cyan arrow for progress lines.
pub fn info() -> StyledObject<&'static str> {
    style("→").cyan()
}

pub fn warn() -> StyledObject<&'static str> {
    style("!").yellow()
}

pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

pub fn bullet() -> StyledObject<&'static str> {
    style("•").dim()
}

/// Marker for a quote row: check for the best offer, cross when sold out.
pub fn quote_marker(best: bool, available: bool) -> StyledObject<&'static str> {
    match (best, available) {
        (true, _) => success(),
        (false, false) => error(),
        (false, true) => bullet(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_marker_prefers_best() {
        assert_eq!(quote_marker(true, true).to_string(), success().to_string());
        assert_eq!(quote_marker(false, false).to_string(), error().to_string());
        assert_eq!(quote_marker(false, true).to_string(), bullet().to_string());
    }
}
