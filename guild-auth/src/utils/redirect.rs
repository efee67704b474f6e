//! Redirect target checks shared by the client registry, the authorization
//! endpoint and the post-login redirect.
//!
//! One rule everywhere: a candidate matches an allowed entry when it is the
//! entry itself or the entry followed by a `/` path extension. Plain prefix
//! matching would let `https://example.com.attacker.com` through.

use reqwest::Url;

/// Exact-or-path-extension match against an allow-list.
pub fn redirect_uri_allowed(allowed: &[String], uri: &str) -> bool {
    allowed.iter().any(|entry| matches_entry(entry, uri))
}

fn matches_entry(entry: &str, uri: &str) -> bool {
    let entry = entry.trim_end_matches('/');
    if entry.is_empty() {
        return false;
    }
    uri == entry
        || uri
            .strip_prefix(entry)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether a URI may be registered as a client redirect target.
///
/// Requires an absolute `https` URL with a host, except plain `http` for
/// loopback hosts during development. Fragments are never allowed.
pub fn is_registrable_redirect_uri(uri: &str) -> bool {
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    if url.fragment().is_some() || !url.username().is_empty() || url.password().is_some() {
        return false;
    }
    match (url.scheme(), url.host_str()) {
        ("https", Some(host)) => !host.is_empty(),
        ("http", Some(host)) => matches!(host, "localhost" | "127.0.0.1" | "[::1]"),
        _ => false,
    }
}

/// Base that relative post-login targets are resolved against.
const RELATIVE_BASE: &str = "https://post-login.invalid/";

/// Resolve where to send the browser after login.
///
/// Accepts same-site relative paths and absolute URLs under an allowed
/// origin; anything else yields `None` so the caller falls back to its default.
/// The result is always a legal `Location` header value.
pub fn safe_post_login_redirect(candidate: &str, allowed_origins: &[String]) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    // Browsers drop tab, CR and LF while parsing, so `/\t/evil.test` becomes `//evil.test`
    if candidate.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }

    if candidate.starts_with('/') {
        // Scheme-relative and backslash tricks resolve to foreign hosts
        if candidate.starts_with("//") || candidate.contains('\\') {
            return None;
        }
        let base = Url::parse(RELATIVE_BASE).ok()?;
        let resolved = base.join(candidate).ok()?;
        return (resolved.origin() == base.origin()).then(|| candidate.to_string());
    }

    redirect_uri_allowed(allowed_origins, candidate).then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origins() -> Vec<String> {
        vec!["https://example.com".to_string()]
    }

    #[test]
    fn test_accepts_origin_and_paths_under_it() {
        assert!(redirect_uri_allowed(&origins(), "https://example.com"));
        assert!(redirect_uri_allowed(&origins(), "https://example.com/callback"));
        assert!(redirect_uri_allowed(&origins(), "https://example.com/a/b?c=d"));
    }

    #[test]
    fn test_rejects_lookalike_hosts_and_schemes() {
        for uri in [
            "https://example.com.attacker.com",
            "http://example.com",
            "https://attacker.com",
            "https://example.com@attacker.com",
            "https://example.comx",
            "",
        ] {
            assert!(!redirect_uri_allowed(&origins(), uri), "accepted {}", uri);
        }
    }

    #[test]
    fn test_trailing_slash_entry_behaves_like_bare_origin() {
        let allowed = vec!["https://example.com/".to_string()];
        assert!(redirect_uri_allowed(&allowed, "https://example.com/cb"));
        assert!(!redirect_uri_allowed(&allowed, "https://example.com.attacker.com"));
    }

    #[test]
    fn test_empty_allow_list_rejects_everything() {
        assert!(!redirect_uri_allowed(&[], "https://example.com"));
        assert!(!redirect_uri_allowed(&[String::new()], "/anything"));
    }

    #[test]
    fn test_registrable_redirect_uris() {
        assert!(is_registrable_redirect_uri("https://app.test/cb"));
        assert!(is_registrable_redirect_uri("http://localhost:3000/callback"));
        assert!(is_registrable_redirect_uri("http://127.0.0.1:8080/cb"));
        assert!(!is_registrable_redirect_uri("http://app.test/cb"));
        assert!(!is_registrable_redirect_uri("https://app.test/cb#frag"));
        assert!(!is_registrable_redirect_uri("https://user@app.test/cb"));
        assert!(!is_registrable_redirect_uri("javascript:alert(1)"));
        assert!(!is_registrable_redirect_uri("/relative"));
    }

    #[test]
    fn test_post_login_redirect() {
        let allowed = origins();
        assert_eq!(
            safe_post_login_redirect("/oauth/authorize?client_id=C1", &allowed).as_deref(),
            Some("/oauth/authorize?client_id=C1")
        );
        assert_eq!(
            safe_post_login_redirect("https://example.com/done", &allowed).as_deref(),
            Some("https://example.com/done")
        );
        assert_eq!(safe_post_login_redirect("//attacker.com", &allowed), None);
        assert_eq!(safe_post_login_redirect("/\\attacker.com", &allowed), None);
        assert_eq!(safe_post_login_redirect("https://attacker.com", &allowed), None);
        assert_eq!(safe_post_login_redirect("", &allowed), None);
    }

    #[test]
    fn test_post_login_redirect_rejects_control_characters() {
        let allowed = origins();
        for candidate in [
            "/\t/attacker.com",
            "/\r/attacker.com",
            "/\n/attacker.com",
            "/a\nb",
            "/a b",
            "/\u{0}x",
            "https://example.com/\tdone",
        ] {
            assert_eq!(
                safe_post_login_redirect(candidate, &allowed),
                None,
                "accepted {:?}",
                candidate
            );
        }
    }

    #[test]
    fn test_post_login_redirect_is_a_valid_header_value() {
        let allowed = origins();
        for candidate in ["/dashboard?tab=1", "/a/../b", "https://example.com/done?x=%0A"] {
            let target = safe_post_login_redirect(candidate, &allowed).unwrap();
            assert!(
                axum::http::HeaderValue::from_str(&target).is_ok(),
                "not a header value: {:?}",
                target
            );
        }
    }
}
