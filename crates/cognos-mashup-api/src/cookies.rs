// Session cookie store with public-suffix domain scoping.
//
// Wraps reqwest's `Jar` and drops any `Set-Cookie` whose `Domain`
// attribute names a public suffix (e.g. `co.uk`, `com`), so a dispatcher
// cannot plant a cookie that would be replayed to unrelated sites.
//
// Cookies set without a `Path` attribute are stored with `Path=/`. The
// dispatcher issues them from `/rds/auth/logon` but expects them back on
// every `/rds/...` endpoint, which the RFC 6265 default path would prevent.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use tracing::trace;
use url::Url;

/// Cookie jar owned by exactly one session.
#[derive(Debug, Default)]
pub struct PublicSuffixJar {
    inner: Jar,
}

impl PublicSuffixJar {
    /// The `Cookie` header value this jar would send to `url`, if any.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let value = self.inner.cookies(url)?;
        value.to_str().ok().map(String::from)
    }
}

impl CookieStore for PublicSuffixJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let host = url.host_str().unwrap_or_default();
        let accepted: Vec<HeaderValue> = cookie_headers
            .filter(|header| {
                let allowed = domain_allowed(header, host);
                if !allowed {
                    trace!(host, "dropping cookie scoped to a public suffix");
                }
                allowed
            })
            .map(with_root_path)
            .collect();

        self.inner.set_cookies(&mut accepted.iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.cookies(url)
    }
}

/// A cookie may carry a `Domain` attribute only if that domain is not a
/// public suffix, unless it is exactly the request host (then it is
/// effectively host-only).
fn domain_allowed(header: &HeaderValue, host: &str) -> bool {
    let Ok(raw) = header.to_str() else {
        return true;
    };
    let Ok(parsed) = cookie::Cookie::parse(raw) else {
        return true;
    };
    let Some(domain) = parsed.domain() else {
        return true;
    };

    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() || domain.eq_ignore_ascii_case(host) {
        return true;
    }

    psl::suffix_str(&domain) != Some(domain.as_str())
}

/// Give a cookie without a `Path` attribute `Path=/`.
fn with_root_path(header: &HeaderValue) -> HeaderValue {
    let Ok(raw) = header.to_str() else {
        return header.clone();
    };
    match cookie::Cookie::parse(raw) {
        Ok(parsed) if parsed.path().is_none() => {
            HeaderValue::from_str(&format!("{raw}; Path=/")).unwrap_or_else(|_| header.clone())
        }
        _ => header.clone(),
    }
}
