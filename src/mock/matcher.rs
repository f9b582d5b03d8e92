use super::request::MockRequest;
use super::response::Responder;
use http::{Method, Uri};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// URL matching strategy for a registered mock
///
/// Exact patterns built from absolute URLs such as `http://127.0.0.1:4000/api/user`
/// keep only their path and query, which is what the server sees.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Matches the request path, or the full path and query
    Exact(String),
    /// Matches anywhere in the path and query
    Regex(Regex),
}

impl UrlPattern {
    pub fn matches(&self, request: &MockRequest) -> bool {
        match self {
            UrlPattern::Exact(url) => request.path() == url || request.url() == url,
            UrlPattern::Regex(regex) => regex.is_match(request.url()),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(url) => write!(f, "{url}"),
            UrlPattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

fn origin_form(url: &str) -> Option<String> {
    let uri: Uri = url.parse().ok()?;
    uri.scheme()?;
    Some(
        uri.path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
            .to_string(),
    )
}

impl From<&str> for UrlPattern {
    fn from(url: &str) -> Self {
        UrlPattern::Exact(origin_form(url).unwrap_or_else(|| url.to_string()))
    }
}

impl From<String> for UrlPattern {
    fn from(url: String) -> Self {
        match origin_form(&url) {
            Some(path) => UrlPattern::Exact(path),
            None => UrlPattern::Exact(url),
        }
    }
}

impl From<Regex> for UrlPattern {
    fn from(regex: Regex) -> Self {
        UrlPattern::Regex(regex)
    }
}

/// A registered method/URL pair and the responder answering it
pub(crate) struct Handler {
    /// `None` matches every method
    pub(crate) method: Option<Method>,
    pub(crate) url: UrlPattern,
    pub(crate) responder: Arc<dyn Responder>,
    pub(crate) hits: Arc<AtomicUsize>,
}

impl Handler {
    pub(crate) fn matches(&self, request: &MockRequest) -> bool {
        self.method
            .as_ref()
            .is_none_or(|method| method == request.method())
            && self.url.matches(request)
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("hits", &self.hits.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Handle on a registered mock
#[derive(Debug, Clone)]
pub struct Mock {
    method: Option<Method>,
    url: String,
    hits: Arc<AtomicUsize>,
}

impl Mock {
    pub(crate) fn new(method: Option<Method>, url: &UrlPattern, hits: Arc<AtomicUsize>) -> Self {
        Self {
            method,
            url: url.to_string(),
            hits,
        }
    }

    /// Number of requests this mock has answered
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
