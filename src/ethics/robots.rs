//! robots.txt parsing and path matching.
//!
//! Supports `User-agent` groups, `Allow`/`Disallow` with `*` wildcards and a
//! trailing `$` anchor, and `Crawl-delay`. The most specific (longest)
//! matching rule decides; on a tie, `Allow` wins.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    allow: bool,
    pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

/// Parsed crawl-permission rules for one host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

impl RobotsRules {
    /// Rules that allow everything (missing or unreadable robots.txt).
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;

        for raw in text.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // Consecutive user-agent lines share one group.
                    let starts_new = current
                        .as_ref()
                        .map(|g| !g.rules.is_empty() || g.crawl_delay.is_some())
                        .unwrap_or(true);
                    if starts_new {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(Group::default());
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    // An empty Disallow permits everything; it adds no rule.
                    if value.is_empty() {
                        continue;
                    }
                    group.rules.push(Rule {
                        allow: key == "allow",
                        pattern: value.to_string(),
                    });
                }
                "crawl-delay" => {
                    if let Some(group) = current.as_mut() {
                        group.crawl_delay = value.parse::<f64>().ok().filter(|d| *d >= 0.0);
                    }
                }
                _ => {}
            }
        }

        if let Some(group) = current {
            groups.push(group);
        }

        Self { groups }
    }

    /// The group that applies to `product_token`: an exact agent match first,
    /// then the `*` group.
    fn group_for(&self, product_token: &str) -> Option<&Group> {
        let token = product_token.to_ascii_lowercase();
        self.groups
            .iter()
            .find(|g| {
                g.agents
                    .iter()
                    .any(|a| !a.is_empty() && a != "*" && token.contains(a.as_str()))
            })
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }

    /// Whether `path` (path plus optional query) may be fetched.
    pub fn is_allowed(&self, product_token: &str, path: &str) -> bool {
        let Some(group) = self.group_for(product_token) else {
            return true;
        };

        let path = if path.is_empty() { "/" } else { path };
        let mut best: Option<&Rule> = None;
        for rule in &group.rules {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(prev) if rule.pattern.len() > prev.pattern.len() => Some(rule),
                Some(prev) if rule.pattern.len() == prev.pattern.len() && rule.allow => {
                    Some(rule)
                }
                keep => keep,
            };
        }

        best.map(|r| r.allow).unwrap_or(true)
    }

    /// Crawl-delay advertised for `product_token`, if any.
    pub fn crawl_delay(&self, product_token: &str) -> Option<Duration> {
        self.group_for(product_token)
            .and_then(|g| g.crawl_delay)
            .map(Duration::from_secs_f64)
    }
}

/// Match a robots path pattern (`*` wildcard, optional `$` end anchor).
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0usize;

    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            if !path.starts_with(part) {
                return false;
            }
            pos = part.len();
            continue;
        }
        if part.is_empty() {
            continue;
        }
        let is_last = i == parts.len() - 1;
        if is_last && anchored {
            // The final literal must sit at the very end.
            return path.len() >= pos + part.len() && path.ends_with(part);
        }
        match path[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }

    if anchored {
        // Trailing `*` before `$` matches anything; otherwise exact end.
        pattern.ends_with('*') || pos == path.len()
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "
        # comment
        User-agent: *
        Disallow: /rooms/
        Allow: /rooms/public
        Crawl-delay: 2

        User-agent: badbot
        User-agent: worsebot
        Disallow: /

        User-agent: staycompare
        Disallow: /api/
        Disallow: /*.json$
    ";

    #[test]
    fn wildcard_group_applies_to_unknown_agents() {
        let rules = RobotsRules::parse(ROBOTS);
        assert!(!rules.is_allowed("otherbot", "/rooms/123"));
        assert!(rules.is_allowed("otherbot", "/rooms/public/1"));
        assert!(rules.is_allowed("otherbot", "/hotel/us/x.html"));
        assert_eq!(
            rules.crawl_delay("otherbot"),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn specific_group_overrides_wildcard() {
        let rules = RobotsRules::parse(ROBOTS);
        assert!(rules.is_allowed("staycompare", "/rooms/123"));
        assert!(!rules.is_allowed("staycompare", "/api/v2/prices"));
        assert!(!rules.is_allowed("staycompare", "/data/listing.json"));
        assert!(rules.is_allowed("staycompare", "/data/listing.json?x=1"));
        assert!(!rules.is_allowed("worsebot", "/anything"));
        assert!(!rules.is_allowed("badbot", "/"));
    }

    #[test]
    fn empty_or_missing_rules_allow_everything() {
        assert!(RobotsRules::allow_all().is_allowed("staycompare", "/rooms/1"));
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n");
        assert!(rules.is_allowed("staycompare", "/rooms/1"));
    }

    #[test]
    fn pattern_matching() {
        assert!(pattern_matches("/rooms", "/rooms/1"));
        assert!(pattern_matches("/*/prices", "/api/prices"));
        assert!(pattern_matches("/*.php$", "/index.php"));
        assert!(!pattern_matches("/*.php$", "/index.php?x"));
        assert!(pattern_matches("/exact$", "/exact"));
        assert!(!pattern_matches("/exact$", "/exact/more"));
        assert!(!pattern_matches("/private", "/public"));
    }
}
