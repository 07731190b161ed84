//! Issue titles from the GitHub REST API.

use super::{Fetch, LookupCache, LookupError};
use crate::{config::SiteConfig, log};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::time::Duration;

const API_ROOT: &str = "https://api.github.com";

/// Fetches URLs with a blocking HTTP client.
pub struct HttpFetch {
    client: reqwest::blocking::Client,
}

impl HttpFetch {
    pub fn new(timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|source| LookupError::Http {
                url: API_ROOT.to_owned(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetch {
    fn fetch(&self, url: &str) -> Result<String, LookupError> {
        let http_err = |source| LookupError::Http {
            url: url.to_owned(),
            source,
        };
        self.client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(http_err)
    }
}

/// Resolves `{#N}` references to issue titles through the lookup cache.
///
/// Without a fetcher only cached titles are returned.
pub struct IssueResolver {
    repo: Option<String>,
    fetch: Option<Box<dyn Fetch>>,
    /// Keys whose fetch failed during this process; not retried.
    failed: Mutex<FxHashSet<String>>,
}

impl IssueResolver {
    pub fn new(repo: Option<String>, fetch: Option<Box<dyn Fetch>>) -> Self {
        Self {
            repo,
            fetch,
            failed: Mutex::new(FxHashSet::default()),
        }
    }

    /// Resolver that never touches the network.
    pub fn offline(repo: Option<String>) -> Self {
        Self::new(repo, None)
    }

    /// Resolver for `[lookup]`: online only when a repository is configured
    /// and `offline` is off.
    pub fn from_config(config: &SiteConfig) -> Result<Self, LookupError> {
        let repo = config.lookup.github_repo.clone();
        if !config.lookup.is_online() {
            return Ok(Self::offline(repo));
        }
        let fetch = HttpFetch::new(Duration::from_secs(config.lookup.timeout_secs))?;
        Ok(Self::new(repo, Some(Box::new(fetch))))
    }

    /// Cache key of issue `number`.
    pub fn cache_key(repo: &str, number: u32) -> String {
        format!("github:{repo}/issues/{number}")
    }

    /// Browser URL of issue `number`, if a repository is configured.
    pub fn issue_url(&self, number: u32) -> Option<String> {
        self.repo
            .as_ref()
            .map(|repo| format!("https://github.com/{repo}/issues/{number}"))
    }

    /// Title of issue `number`, or `None` when unknown.
    ///
    /// A failed fetch is logged once and rendered without a title; it is
    /// retried on the next build.
    pub fn title(&self, cache: &LookupCache, number: u32) -> Option<String> {
        let repo = self.repo.as_deref()?;
        let key = Self::cache_key(repo, number);

        let Some(fetch) = &self.fetch else {
            return cache.get(&key);
        };
        if self.failed.lock().contains(&key) {
            return None;
        }

        let result = cache.get_or_fetch(&key, || {
            let url = format!("{API_ROOT}/repos/{repo}/issues/{number}");
            let body = fetch.fetch(&url)?;
            parse_title(&url, &body)
        });

        match result {
            Ok(title) => Some(title),
            Err(err) => {
                log!("warn"; "issue #{number}: {err}");
                self.failed.lock().insert(key);
                None
            }
        }
    }
}

fn parse_title(url: &str, body: &str) -> Result<String, LookupError> {
    let invalid = |reason: String| LookupError::Response {
        url: url.to_owned(),
        reason,
    };
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|err| invalid(err.to_string()))?;
    json.get("title")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| invalid("missing `title`".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    struct FakeFetch {
        body: &'static str,
        calls: Arc<AtomicUsize>,
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl Fetch for FakeFetch {
        fn fetch(&self, url: &str) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().push(url.to_owned());
            Ok(self.body.to_owned())
        }
    }

    /// Fails like an unreachable network.
    struct DownFetch {
        calls: Arc<AtomicUsize>,
    }

    impl Fetch for DownFetch {
        fn fetch(&self, url: &str) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LookupError::Response {
                url: url.to_owned(),
                reason: "connection refused".into(),
            })
        }
    }

    fn resolver(body: &'static str) -> (IssueResolver, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let urls = Arc::new(Mutex::new(Vec::new()));
        let fetch = FakeFetch {
            body,
            calls: Arc::clone(&calls),
            urls: Arc::clone(&urls),
        };
        let resolver = IssueResolver::new(Some("owner/repo".into()), Some(Box::new(fetch)));
        (resolver, calls, urls)
    }

    #[test]
    fn test_title_fetched_once_and_cached() {
        let cache = LookupCache::new("unused.json");
        let (resolver, calls, urls) = resolver(r#"{"title": "Fix speaker names", "number": 7}"#);

        assert_eq!(resolver.title(&cache, 7).as_deref(), Some("Fix speaker names"));
        assert_eq!(resolver.title(&cache, 7).as_deref(), Some("Fix speaker names"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            urls.lock().as_slice(),
            ["https://api.github.com/repos/owner/repo/issues/7"]
        );
        assert_eq!(
            cache.get("github:owner/repo/issues/7").as_deref(),
            Some("Fix speaker names")
        );
    }

    #[test]
    fn test_title_bad_response_is_none() {
        let cache = LookupCache::new("unused.json");
        let (resolver, _, _) = resolver(r#"{"message": "Not Found"}"#);

        assert_eq!(resolver.title(&cache, 1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_fetch_not_retried() {
        let cache = LookupCache::new("unused.json");
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = DownFetch {
            calls: Arc::clone(&calls),
        };
        let resolver = IssueResolver::new(Some("owner/repo".into()), Some(Box::new(fetch)));

        for _ in 0..5 {
            assert_eq!(resolver.title(&cache, 3), None);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Other issues are still tried
        assert_eq!(resolver.title(&cache, 4), None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_offline_uses_cache_only() {
        let cache = LookupCache::new("unused.json");
        cache.put(IssueResolver::cache_key("owner/repo", 3), "Cached");
        let resolver = IssueResolver::offline(Some("owner/repo".into()));

        assert_eq!(resolver.title(&cache, 3).as_deref(), Some("Cached"));
        assert_eq!(resolver.title(&cache, 4), None);
    }

    #[test]
    fn test_no_repo_has_no_title_or_url() {
        let cache = LookupCache::new("unused.json");
        let resolver = IssueResolver::offline(None);
        assert_eq!(resolver.title(&cache, 1), None);
        assert_eq!(resolver.issue_url(1), None);
    }

    #[test]
    fn test_issue_url() {
        let resolver = IssueResolver::offline(Some("owner/repo".into()));
        assert_eq!(
            resolver.issue_url(12).as_deref(),
            Some("https://github.com/owner/repo/issues/12")
        );
    }

    #[test]
    fn test_from_config_default_is_offline() {
        let resolver = IssueResolver::from_config(&SiteConfig::default()).unwrap();
        assert!(resolver.fetch.is_none());
    }
}
