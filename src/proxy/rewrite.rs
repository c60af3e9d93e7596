//! Pure rewriting rules applied by the director and to the response.

use std::net::IpAddr;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Headers meaningful only to a single connection. Never forwarded in
/// either direction.
pub const HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Joins the configured downstream path with the inbound path so that
/// exactly one slash separates them.
pub fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Merges the configured query with the inbound one.
///
/// The separator is inserted whenever either side is non-empty, so
/// `("a=1", "")` yields `"a=1&"` and `("", "b=2")` yields `"&b=2"`.
pub fn merge_query(configured: &str, inbound: &str) -> String {
    if configured.is_empty() && inbound.is_empty() {
        return String::new();
    }
    format!("{configured}&{inbound}")
}

/// Removes the fixed hop-by-hop set plus every header named as a token in
/// the message's own `Connection` header.
pub fn remove_hop_headers(headers: &mut HeaderMap) {
    // Tokens must be read before `connection` itself goes.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| HeaderName::from_bytes(token.as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_HEADERS {
        headers.remove(name);
    }
}

/// Appends `client` to the forwarding chain, or starts one.
///
/// Prior values are joined as raw bytes, so a hop that wrote non-UTF-8
/// (obs-text) is kept rather than dropped.
pub fn append_forwarded_for(
    headers: &mut HeaderMap,
    client: IpAddr,
) -> Result<(), http::header::InvalidHeaderValue> {
    let mut chain = Vec::new();
    for value in headers.get_all(&X_FORWARDED_FOR) {
        chain.extend_from_slice(value.as_bytes());
        chain.push(b',');
    }
    chain.extend_from_slice(client.to_string().as_bytes());

    headers.insert(X_FORWARDED_FOR, HeaderValue::from_bytes(&chain)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_never_doubles_or_drops_the_slash() {
        assert_eq!(join_path("/api/", "/v1/x"), "/api/v1/x");
        assert_eq!(join_path("/api", "v1/x"), "/api/v1/x");
        assert_eq!(join_path("/api", "/v1/x"), "/api/v1/x");
        assert_eq!(join_path("/api/", "v1/x"), "/api/v1/x");
        assert_eq!(join_path("", "/v1"), "/v1");
    }

    #[test]
    fn merge_keeps_the_separator_quirk() {
        assert_eq!(merge_query("", ""), "");
        assert_eq!(merge_query("a=1", ""), "a=1&");
        assert_eq!(merge_query("", "b=2"), "&b=2");
        assert_eq!(merge_query("a=1", "b=2"), "a=1&b=2");
    }

    #[test]
    fn strips_fixed_set_and_connection_tokens() {
        let mut headers = HeaderMap::new();
        for name in HOP_HEADERS {
            headers.insert(name, HeaderValue::from_static("x"));
        }
        headers.insert(header::CONNECTION, HeaderValue::from_static("x-session, x-trace"));
        headers.insert("x-session", HeaderValue::from_static("1"));
        headers.insert("x-trace", HeaderValue::from_static("2"));
        headers.insert("x-keep", HeaderValue::from_static("3"));

        remove_hop_headers(&mut headers);

        for name in HOP_HEADERS {
            assert!(!headers.contains_key(name), "{name} survived");
        }
        assert!(!headers.contains_key("x-session"));
        assert!(!headers.contains_key("x-trace"));
        assert_eq!(headers["x-keep"], "3");
    }

    #[test]
    fn forwarding_chain_appends() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("9.9.9.9"));
        append_forwarded_for(&mut headers, "1.2.3.4".parse().unwrap()).unwrap();
        assert_eq!(headers[X_FORWARDED_FOR], "9.9.9.9,1.2.3.4");
    }

    #[test]
    fn forwarding_chain_starts_fresh() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "1.2.3.4".parse().unwrap()).unwrap();
        assert_eq!(headers[X_FORWARDED_FOR], "1.2.3.4");
    }

    #[test]
    fn forwarding_chain_keeps_every_prior_value() {
        let mut headers = HeaderMap::new();
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("9.9.9.9"));
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("8.8.8.8"));
        append_forwarded_for(&mut headers, "1.2.3.4".parse().unwrap()).unwrap();

        assert_eq!(headers.get_all(X_FORWARDED_FOR).iter().count(), 1);
        assert_eq!(headers[X_FORWARDED_FOR], "9.9.9.9,8.8.8.8,1.2.3.4");
    }

    #[test]
    fn forwarding_chain_keeps_non_utf8_hops() {
        let mut headers = HeaderMap::new();
        let prior = HeaderValue::from_bytes(b"9.9.9.9, proxy-\xe9").unwrap();
        headers.insert(X_FORWARDED_FOR, prior);

        append_forwarded_for(&mut headers, "1.2.3.4".parse().unwrap()).unwrap();

        assert_eq!(headers[X_FORWARDED_FOR].as_bytes(), b"9.9.9.9, proxy-\xe9,1.2.3.4");
    }
}
