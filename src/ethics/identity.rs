//! Request identity pools.
//!
//! Identities come from configuration so operators can refresh the pools
//! without a rebuild. Rotating them spreads a burst of requests across
//! several ordinary client fingerprints; it is a courtesy toward the
//! receiving site, not a security or evasion mechanism.

use rand::seq::SliceRandom;

use crate::config::{IdentityConfig, DEFAULT_USER_AGENT};

/// User agent plus the extra headers sent with one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

/// Configured user-agent and header-set pools.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    product_token: String,
    user_agents: Vec<String>,
    header_sets: Vec<Vec<(String, String)>>,
}

impl IdentityPool {
    pub fn from_config(config: &IdentityConfig) -> Self {
        let mut user_agents: Vec<String> = config
            .user_agents
            .iter()
            .map(|ua| ua.trim().to_string())
            .filter(|ua| !ua.is_empty())
            .collect();
        if user_agents.is_empty() {
            user_agents.push(DEFAULT_USER_AGENT.to_string());
        }

        let header_sets = config
            .header_sets
            .iter()
            .map(|set| {
                let mut headers: Vec<(String, String)> =
                    set.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                // Stable order for a given set.
                headers.sort();
                headers
            })
            .collect();

        Self {
            product_token: config.product_token.clone(),
            user_agents,
            header_sets,
        }
    }

    /// Token matched against robots.txt user-agent groups.
    pub fn product_token(&self) -> &str {
        &self.product_token
    }

    pub fn len(&self) -> usize {
        self.user_agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_agents.is_empty()
    }

    /// The first configured identity, used when rotation is disabled.
    pub fn primary(&self) -> Identity {
        Identity {
            user_agent: self
                .user_agents
                .first()
                .cloned()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            headers: self.header_sets.first().cloned().unwrap_or_default(),
        }
    }

    /// A pseudo-random user agent paired with a pseudo-random header set.
    pub fn random(&self) -> Identity {
        let mut rng = rand::thread_rng();
        let user_agent = self
            .user_agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let headers = self.header_sets.choose(&mut rng).cloned().unwrap_or_default();
        Identity {
            user_agent,
            headers,
        }
    }
}
