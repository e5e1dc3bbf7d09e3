use crate::url::domain::bare_host;

/// Checks if a host matches a wildcard pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain of it.
///
/// # Examples
///
/// ```
/// use newsprint::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "fr.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Returns true if `candidate` belongs to the site hosted at `site_host`
///
/// A link stays on the site when its host is the site host or one of its
/// subdomains, ignoring a `www.` prefix on either side.
pub fn is_same_site(site_host: &str, candidate: &str) -> bool {
    let site = bare_host(site_host).to_ascii_lowercase();
    let candidate = bare_host(candidate).to_ascii_lowercase();
    matches_wildcard(&format!("*.{}", site), &candidate)
}

/// Looks up a host in a table keyed by domain patterns
///
/// Exact keys win over wildcard keys, and the `www.` prefix is ignored when
/// no exact key exists.
pub fn lookup_host<'a, V>(
    table: impl IntoIterator<Item = (&'a String, &'a V)> + Clone,
    host: &str,
) -> Option<&'a V>
where
    V: 'a,
{
    let host = host.to_ascii_lowercase();
    let bare = bare_host(&host);

    table
        .clone()
        .into_iter()
        .find(|(key, _)| key.as_str() == host || key.as_str() == bare)
        .or_else(|| {
            table
                .into_iter()
                .find(|(key, _)| key.starts_with("*.") && matches_wildcard(key, bare))
        })
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "blog.example.com"));
    }

    #[test]
    fn test_wildcard_matches_nested_subdomains() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
        assert!(!matches_wildcard("*.example.com", "badexample.com"));
    }

    #[test]
    fn test_same_site() {
        assert!(is_same_site("www.hespress.com", "hespress.com"));
        assert!(is_same_site("hespress.com", "fr.hespress.com"));
        assert!(is_same_site("Example.com", "www.example.com"));
        assert!(!is_same_site("hespress.com", "hespress.com.evil.net"));
        assert!(!is_same_site("hespress.com", "other.com"));
    }

    #[test]
    fn test_lookup_host() {
        let mut table = BTreeMap::new();
        table.insert("news.example.com".to_string(), 1);
        table.insert("*.example.com".to_string(), 2);

        assert_eq!(lookup_host(&table, "news.example.com"), Some(&1));
        assert_eq!(lookup_host(&table, "www.news.example.com"), Some(&1));
        assert_eq!(lookup_host(&table, "sport.example.com"), Some(&2));
        assert_eq!(lookup_host(&table, "example.org"), None);
    }
}
