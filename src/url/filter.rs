use crate::url::matcher::is_same_site;
use regex::Regex;
use std::fmt;
use url::Url;

/// Rules deciding which extracted links count as articles of the site
#[derive(Debug, Clone)]
pub struct LinkFilters {
    /// Reject links whose host is not the site host or a subdomain of it
    pub same_domain_only: bool,
    /// Reject links containing any of these substrings
    pub exclude_substrings: Vec<String>,
    /// Reject links matching any of these patterns
    pub deny: Vec<Regex>,
    /// If non-empty, a link must match at least one of these patterns
    pub allow: Vec<Regex>,
}

impl Default for LinkFilters {
    fn default() -> Self {
        Self {
            same_domain_only: true,
            exclude_substrings: Vec::new(),
            deny: Vec::new(),
            allow: Vec::new(),
        }
    }
}

/// Why a link was rejected by [`LinkFilters`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    OffSite { host: String },
    ExcludedSubstring(String),
    Denied(String),
    NotAllowed,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffSite { host } => write!(f, "off-site host '{}'", host),
            Self::ExcludedSubstring(s) => write!(f, "contains excluded substring '{}'", s),
            Self::Denied(pattern) => write!(f, "matches deny pattern '{}'", pattern),
            Self::NotAllowed => write!(f, "matches no allow pattern"),
        }
    }
}

impl LinkFilters {
    /// Checks a canonical link against the filters
    ///
    /// # Arguments
    ///
    /// * `link` - The absolute article link
    /// * `site` - The site base URL
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The link is accepted
    /// * `Err(FilterReason)` - The first rule that rejected it
    pub fn accepts(&self, link: &Url, site: &Url) -> Result<(), FilterReason> {
        if self.same_domain_only {
            let host = link.host_str().unwrap_or_default();
            let site_host = site.host_str().unwrap_or_default();
            if !is_same_site(site_host, host) {
                return Err(FilterReason::OffSite {
                    host: host.to_string(),
                });
            }
        }

        let text = link.as_str();

        if let Some(sub) = self
            .exclude_substrings
            .iter()
            .find(|sub| text.contains(sub.as_str()))
        {
            return Err(FilterReason::ExcludedSubstring(sub.clone()));
        }

        if let Some(re) = self.deny.iter().find(|re| re.is_match(text)) {
            return Err(FilterReason::Denied(re.as_str().to_string()));
        }

        if !self.allow.is_empty() && !self.allow.iter().any(|re| re.is_match(text)) {
            return Err(FilterReason::NotAllowed);
        }

        Ok(())
    }
}
