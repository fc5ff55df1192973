//! Robots.txt parser implementation
//!
//! This module provides functionality for parsing robots.txt content using the robotstxt crate.

use robotstxt::DefaultMatcher;

/// Blanket verdict used when there is no robots.txt body to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Blanket {
    AllowAll,
    DenyAll,
}

/// Parsed robots.txt data
///
/// This is a wrapper around the robotstxt crate's types, providing a simplified
/// interface for checking if URLs are allowed.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    /// Verdict that replaces evaluation of `content`, if any
    blanket: Option<Blanket>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            blanket: None,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            blanket: Some(Blanket::AllowAll),
        }
    }

    /// Creates a ParsedRobots that disallows everything
    pub fn deny_all() -> Self {
        Self {
            content: String::new(),
            blanket: Some(Blanket::DenyAll),
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// Groups naming `user_agent` take precedence; otherwise the `*` group
    /// applies. An empty or unparseable body allows everything.
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The product token of the crawler (e.g. "SumiIngest")
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.blanket {
            Some(Blanket::AllowAll) => return true,
            Some(Blanket::DenyAll) => return false,
            None => {}
        }

        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// # Returns
    ///
    /// * `Some(f64)` - The crawl delay in seconds
    /// * `None` - If no crawl delay is specified
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.blanket.is_some() || self.content.is_empty() {
            return None;
        }

        // Crawl-delay applies to the most recent User-agent group
        let mut current_user_agents: Vec<String> = Vec::new();
        let mut in_group_body = false;
        let mut crawl_delay_for_wildcard: Option<f64> = None;
        let mut crawl_delay_for_agent: Option<f64> = None;

        let agent_token = product_token(user_agent);

        for line in self.content.lines() {
            let trimmed = line.split('#').next().unwrap_or("").trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A User-agent line after rules starts a new group
                    if in_group_body {
                        current_user_agents.clear();
                        in_group_body = false;
                    }
                    current_user_agents.push(value.to_string());
                }
                "crawl-delay" => {
                    in_group_body = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if delay < 0.0 || !delay.is_finite() {
                        continue;
                    }
                    for ua in &current_user_agents {
                        if ua == "*" {
                            crawl_delay_for_wildcard = Some(delay);
                        } else if !agent_token.is_empty()
                            && product_token(ua).eq_ignore_ascii_case(agent_token)
                        {
                            crawl_delay_for_agent = Some(delay);
                        }
                    }
                }
                _ => in_group_body = true,
            }
        }

        // Prefer specific user-agent delay over wildcard delay
        crawl_delay_for_agent.or(crawl_delay_for_wildcard)
    }
}

/// Leading product token of a user-agent string: `TestBot/1.0 (+url)` is `TestBot`
fn product_token(agent: &str) -> &str {
    let agent = agent.trim_start();
    let end = agent
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(agent.len());
    &agent[..end]
}
