//! Origin allow-list and CORS/security response headers.

use lambda_http::http::HeaderMap;

/// Value sent in `Access-Control-Allow-Origin` for rejected origins.
pub const REJECTED_ORIGIN: &str = "null";

const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Amz-Date, X-Api-Key";
const EXPOSE_HEADERS: &str = "X-Amz-Request-Id";
const MAX_AGE_SECS: &str = "300";

/// One entry of the origin allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    /// Matches a single origin, e.g. `https://localhost:8501`.
    Exact(String),
    /// `<scheme>://*.<suffix>`: matches any subdomain of `suffix` on that scheme.
    /// `suffix` is stored with its leading dot.
    Subdomain { scheme: String, suffix: String },
}

impl OriginPattern {
    /// Parse a single allow-list entry.
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        if let Some((scheme, rest)) = entry.split_once("://") {
            if let Some(domain) = rest.strip_prefix("*.") {
                return OriginPattern::Subdomain {
                    scheme: scheme.to_ascii_lowercase(),
                    suffix: format!(".{}", domain.to_ascii_lowercase()),
                };
            }
        }
        OriginPattern::Exact(entry.to_string())
    }

    /// Parse a comma-separated allow-list, skipping blank entries.
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Whether `origin` is permitted by this pattern.
    pub fn matches(&self, origin: &str) -> bool {
        match self {
            OriginPattern::Exact(allowed) => origin == allowed,
            OriginPattern::Subdomain { scheme, suffix } => {
                let Some((origin_scheme, host)) = origin.split_once("://") else {
                    return false;
                };
                if !origin_scheme.eq_ignore_ascii_case(scheme) {
                    return false;
                }
                let host = host.to_ascii_lowercase();
                let Some(label) = host.strip_suffix(suffix.as_str()) else {
                    return false;
                };
                // Leading dot in `suffix` means "evilstreamlit.app" never reaches here.
                !label.is_empty()
                    && label.split('.').all(|part| {
                        !part.is_empty()
                            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                    })
            }
        }
    }
}

/// Outcome of checking a request's `Origin` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// No origin header: a non-browser caller.
    Absent,
    /// Origin matched the allow-list.
    Allowed(String),
    /// Origin did not match.
    Rejected(String),
}

impl OriginDecision {
    /// Evaluate an origin header against the allow-list.
    pub fn evaluate(origin: Option<&str>, allowed: &[OriginPattern]) -> Self {
        match origin.map(str::trim).filter(|o| !o.is_empty()) {
            None => OriginDecision::Absent,
            Some(origin) if allowed.iter().any(|p| p.matches(origin)) => {
                OriginDecision::Allowed(origin.to_string())
            }
            Some(origin) => OriginDecision::Rejected(origin.to_string()),
        }
    }

    /// Evaluate the `Origin` header of a request.
    ///
    /// A header that is present but not visible ASCII can never match the
    /// allow-list, so it is rejected rather than treated as absent.
    pub fn from_headers(headers: &HeaderMap, allowed: &[OriginPattern]) -> Self {
        match headers.get("origin") {
            None => OriginDecision::Absent,
            Some(value) => match value.to_str() {
                Ok(origin) => Self::evaluate(Some(origin), allowed),
                Err(_) => {
                    OriginDecision::Rejected(String::from_utf8_lossy(value.as_bytes()).into_owned())
                }
            },
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, OriginDecision::Rejected(_))
    }
}

/// Ordered response headers to attach to every response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders(Vec<(&'static str, String)>);

impl ResponseHeaders {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(key, value)| (*key, value.as_str()))
    }

    fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.push((name, value.into()));
    }
}

/// Build the CORS and security headers for a response.
///
/// An absent origin gets the first exact allow-list entry instead of an echo.
pub fn build_headers(
    decision: &OriginDecision,
    allowed: &[OriginPattern],
    methods: &str,
) -> ResponseHeaders {
    let allow_origin = match decision {
        OriginDecision::Allowed(origin) => Some(origin.clone()),
        OriginDecision::Rejected(_) => Some(REJECTED_ORIGIN.to_string()),
        OriginDecision::Absent => allowed.iter().find_map(|p| match p {
            OriginPattern::Exact(origin) => Some(origin.clone()),
            OriginPattern::Subdomain { .. } => None,
        }),
    };

    let mut headers = ResponseHeaders::default();
    headers.push("Content-Type", "application/json");
    if let Some(origin) = allow_origin {
        headers.push("Access-Control-Allow-Origin", origin);
    }
    headers.push("Access-Control-Allow-Methods", methods);
    headers.push("Access-Control-Allow-Headers", ALLOW_HEADERS);
    headers.push("Access-Control-Expose-Headers", EXPOSE_HEADERS);
    headers.push("Access-Control-Max-Age", MAX_AGE_SECS);
    headers.push("X-Content-Type-Options", "nosniff");
    headers.push("X-Frame-Options", "DENY");
    headers.push("X-XSS-Protection", "1; mode=block");
    headers.push(
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains",
    );
    headers
}
