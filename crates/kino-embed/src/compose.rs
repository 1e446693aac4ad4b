//! Embed URL composition
//!
//! Combines a base resource URL with the embed parameters. The base is never
//! parsed or normalized, so composing with no parameters hands it back verbatim.
//! Without a base there is nothing to load and the result is empty.

use crate::types::EmbedParams;
use url::form_urlencoded;
use url::Url;

/// Append `params` to `base` as a query string
pub fn compose(base: &str, params: &EmbedParams) -> String {
    if base.is_empty() || params.is_empty() {
        return base.to_string();
    }

    let (head, fragment) = match base.find('#') {
        Some(idx) => base.split_at(idx),
        None => (base, ""),
    };

    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        query.append_pair(key, &value.to_string());
    }
    let query = query.finish();

    let separator = if !head.contains('?') {
        "?"
    } else if head.ends_with('?') || head.ends_with('&') {
        ""
    } else {
        "&"
    };

    format!("{head}{separator}{query}{fragment}")
}

/// Connection key used when warming up the destination of `url`
///
/// This is the origin (`scheme://host[:port]`); URLs without a tuple origin
/// are keyed by themselves.
pub fn destination(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let origin = parsed.origin();
            if origin.is_tuple() {
                origin.ascii_serialization()
            } else {
                url.to_string()
            }
        }
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;

    fn params(pairs: &[(&str, ParamValue)]) -> EmbedParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_params_returns_base() {
        for base in ["https://player.example/embed/abc", "https://a.b", "", "not a url"] {
            assert_eq!(compose(base, &EmbedParams::new()), base);
        }
    }

    #[test]
    fn test_empty_base_ignores_params() {
        let p = params(&[("autoplay", 1.into())]);
        assert_eq!(compose("", &p), "");
    }

    #[test]
    fn test_single_param() {
        let p = params(&[("autoplay", 1.into())]);
        assert_eq!(
            compose("https://player.example/embed/abc", &p),
            "https://player.example/embed/abc?autoplay=1"
        );
    }

    #[test]
    fn test_existing_query_and_fragment() {
        let p = params(&[("muted", true.into()), ("start", 30.into())]);
        assert_eq!(
            compose("https://player.example/v?id=9#t", &p),
            "https://player.example/v?id=9&muted=true&start=30#t"
        );
        assert_eq!(
            compose("https://player.example/v?", &p),
            "https://player.example/v?muted=true&start=30"
        );
    }

    #[test]
    fn test_values_are_encoded() {
        let p = params(&[("title", "a b&c".into())]);
        assert_eq!(compose("https://p.example/", &p), "https://p.example/?title=a+b%26c");
    }

    #[test]
    fn test_deterministic() {
        let p = params(&[("z", 1.into()), ("a", "x".into()), ("m", false.into())]);
        let first = compose("https://p.example/e", &p);
        assert_eq!(first, compose("https://p.example/e", &p));
        assert_eq!(first, "https://p.example/e?a=x&m=false&z=1");
    }

    #[test]
    fn test_destination() {
        assert_eq!(
            destination("https://player.example/embed/abc?autoplay=1"),
            "https://player.example"
        );
        assert_eq!(destination("https://cdn.a:8443/x"), "https://cdn.a:8443");
        assert_eq!(destination("not a url"), "not a url");
    }
}
