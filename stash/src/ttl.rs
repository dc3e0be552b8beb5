use crate::domain::{CacheDirective, Headers};
use shared::TtlMs;

/// Whether, and for how long, a response should be cached
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachingDecision {
    NoCache,
    CacheFor(TtlMs),
}

impl CachingDecision {
    pub fn ttl(&self) -> Option<TtlMs> {
        match self {
            CachingDecision::CacheFor(ttl) => Some(*ttl),
            CachingDecision::NoCache => None,
        }
    }

    fn positive(ttl: Option<TtlMs>) -> Self {
        match ttl {
            Some(ttl) if ttl.is_positive() => CachingDecision::CacheFor(ttl),
            _ => CachingDecision::NoCache,
        }
    }
}

/// Resolve the caching decision for one response.
///
/// The request directive wins over everything: a positive number is the TTL,
/// `false` disables caching, `true` means "use the default TTL". Without a
/// directive the `Cache-Control` header is consulted, but only when
/// `parse_headers` is set.
pub fn resolve(
    directive: Option<CacheDirective>,
    default_ttl: Option<TtlMs>,
    parse_headers: bool,
    headers: &Headers,
) -> CachingDecision {
    match directive {
        Some(CacheDirective::Ttl(ms)) => CachingDecision::positive(Some(TtlMs(ms))),
        Some(CacheDirective::Enabled(false)) => CachingDecision::NoCache,
        Some(CacheDirective::Enabled(true)) => CachingDecision::positive(default_ttl),
        None if parse_headers => {
            CachingDecision::positive(parse_cache_control(headers).map(TtlMs::from_secs))
        }
        None => CachingDecision::NoCache,
    }
}

/// Lifetime in seconds from `Cache-Control`, `s-maxage` first then `max-age`
pub fn parse_cache_control(headers: &Headers) -> Option<u64> {
    let value = headers.get("cache-control")?;

    let mut s_maxage = None;
    let mut max_age = None;

    for directive in value.split(',') {
        let Some((name, raw)) = directive.split_once('=') else {
            continue;
        };
        let Some(seconds) = parse_seconds(raw) else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "s-maxage" => s_maxage = Some(seconds),
            "max-age" => max_age = Some(seconds),
            _ => {}
        }
    }

    s_maxage.or(max_age)
}

fn parse_seconds(raw: &str) -> Option<u64> {
    let raw = raw.trim().trim_matches('"');
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_control(value: &str) -> Headers {
        [("Cache-Control", value)].into_iter().collect()
    }

    #[test]
    fn test_directive_false_never_caches() {
        let headers = cache_control("max-age=100");
        assert_eq!(
            resolve(Some(false.into()), Some(TtlMs(1000)), true, &headers),
            CachingDecision::NoCache
        );
    }

    #[test]
    fn test_directive_number_is_ttl() {
        let headers = cache_control("max-age=100");
        assert_eq!(
            resolve(Some(2000u64.into()), Some(TtlMs(1000)), true, &headers),
            CachingDecision::CacheFor(TtlMs(2000))
        );
    }

    #[test]
    fn test_directive_zero_does_not_cache() {
        assert_eq!(
            resolve(Some(0u64.into()), Some(TtlMs(1000)), true, &cache_control("max-age=5")),
            CachingDecision::NoCache
        );
    }

    #[test]
    fn test_directive_true_uses_default_ttl() {
        assert_eq!(
            resolve(Some(true.into()), Some(TtlMs(1000)), false, &Headers::new()),
            CachingDecision::CacheFor(TtlMs(1000))
        );
        assert_eq!(
            resolve(Some(true.into()), None, true, &cache_control("max-age=100")),
            CachingDecision::NoCache
        );
    }

    #[test]
    fn test_headers_parsed_only_when_enabled() {
        let headers = cache_control("public, max-age=100");
        assert_eq!(
            resolve(None, None, true, &headers),
            CachingDecision::CacheFor(TtlMs(100_000))
        );
        assert_eq!(resolve(None, None, false, &headers), CachingDecision::NoCache);
        assert_eq!(
            resolve(None, Some(TtlMs(1000)), true, &Headers::new()),
            CachingDecision::NoCache
        );
    }

    #[test]
    fn test_s_maxage_beats_max_age() {
        let headers = cache_control("max-age=1, s-maxage=2");
        assert_eq!(
            resolve(None, None, true, &headers),
            CachingDecision::CacheFor(TtlMs(2000))
        );
        assert_eq!(parse_cache_control(&cache_control("s-maxage=3, max-age=1")), Some(3));
    }

    #[test]
    fn test_case_insensitive_names() {
        let headers: Headers = [("CACHE-CONTROL", "Public, MAX-AGE=10")].into_iter().collect();
        assert_eq!(
            resolve(None, None, true, &headers),
            CachingDecision::CacheFor(TtlMs(10_000))
        );

        let headers: Headers = [("cache-control", "S-MaxAge=7")].into_iter().collect();
        assert_eq!(parse_cache_control(&headers), Some(7));
    }

    #[test]
    fn test_invalid_values_do_not_cache() {
        for value in ["", "one", "a100", "0"] {
            let headers = cache_control(&format!("max-age={}", value));
            assert_eq!(
                resolve(None, None, true, &headers),
                CachingDecision::NoCache,
                "max-age={:?} should not cache",
                value
            );
        }
        assert_eq!(resolve(None, None, true, &cache_control("no-store")), CachingDecision::NoCache);
    }

    #[test]
    fn test_decision_ttl() {
        assert_eq!(CachingDecision::CacheFor(TtlMs(5)).ttl(), Some(TtlMs(5)));
        assert_eq!(CachingDecision::NoCache.ttl(), None);
    }
}
