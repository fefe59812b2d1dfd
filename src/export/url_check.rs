//! Host and domain columns are derived from the URL by the exporting
//! extension and are only validated, never stored.

use tracing::debug;
use url::Url;

use crate::capabilities::DomainResolver;
use crate::export::error::{Field, VisitError};

pub fn parse_url(raw_url: &str) -> Result<Url, VisitError> {
    Url::parse(raw_url).map_err(|err| VisitError::malformed(Field::Url, raw_url, err))
}

/// Hostname of a URL without IPv6 brackets; empty when the URL has no host.
pub fn hostname(url: &Url) -> &str {
    let host = url.host_str().unwrap_or("");
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Validate the host and domain columns against the URL. Blank columns are
/// skipped.
pub fn check_url(
    raw_url: &str,
    host: &str,
    domain: &str,
    domains: &dyn DomainResolver,
) -> Result<(), VisitError> {
    let url = parse_url(raw_url)?;
    if !host.is_empty() {
        let computed = hostname(&url);
        if computed != host {
            if !at_sign_in_path(&url) {
                return Err(VisitError::inconsistent(Field::Host, computed, host));
            }
            debug!(url = raw_url, host, computed, "tolerating host taken from '@' path segment");
        }
    }
    if !domain.is_empty() {
        let computed = domains.registrable_domain(host).unwrap_or_default();
        if computed != domain {
            return Err(VisitError::inconsistent(Field::Domain, computed, domain));
        }
    }
    Ok(())
}

/// The extension's host extraction returns the segment after an `@`
/// anywhere in the URL, so for
/// `https://web.archive.org/save/https://medium.com/@user/article`
/// it reports `user` instead of `web.archive.org`. Exports carrying that
/// host are genuine and must still be accepted.
fn at_sign_in_path(url: &Url) -> bool {
    url.path().contains('@')
}
