//! Response classification relative to the app origin.

use reqwest::header::{self, HeaderMap};
use shellcache_core::origin::same_origin;
use shellcache_core::{Headers, ResponseType};
use url::Url;

/// Classify a response the way a page would see it.
///
/// `chain` is every URL the request visited, starting with the one the page
/// asked for and ending with the one that answered.
///
/// - `basic`: every hop stayed on the app origin
/// - `cors`: some hop left the origin, and the final server allowed the app origin
/// - `opaque`: some hop left the origin without permission
pub fn classify(app_origin: &Url, chain: &[Url], headers: &HeaderMap) -> ResponseType {
    if chain.iter().all(|hop| same_origin(app_origin, hop)) {
        return ResponseType::Basic;
    }

    let allowed = headers
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .is_some_and(|value| value == "*" || value == app_origin.origin().ascii_serialization());

    if allowed { ResponseType::Cors } else { ResponseType::Opaque }
}

/// Where a redirect response points, resolved against the URL that sent it.
///
/// None when there is no usable `Location` or it leaves http(s).
pub fn redirect_target(from: &Url, headers: &HeaderMap) -> Option<Url> {
    let location = headers.get(header::LOCATION)?.to_str().ok()?;
    let next = from.join(location.trim()).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// Flatten a header map into lower-cased name → value, joining repeats with ", ".
///
/// Values that are not valid visible ASCII are dropped.
pub fn flatten_headers(headers: &HeaderMap) -> Headers {
    let mut flat = Headers::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        flat.entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_same_origin_is_basic() {
        let origin = url("http://app.test:5000/");
        let target = url("http://app.test:5000/static/css/style.css");
        assert_eq!(classify(&origin, &[target], &HeaderMap::new()), ResponseType::Basic);
    }

    #[test]
    fn test_cross_origin_redirect_is_not_basic() {
        let origin = url("http://app.test/");
        let requested = url("http://app.test/logo.png");
        let landed = url("https://images.test/logo.png");
        assert_eq!(classify(&origin, &[requested, landed], &HeaderMap::new()), ResponseType::Opaque);
    }

    #[test]
    fn test_redirect_round_trip_is_not_basic() {
        let origin = url("http://app.test/");
        let chain = [url("http://app.test/a"), url("http://other.test/b"), url("http://app.test/c")];
        assert_eq!(classify(&origin, &chain, &HeaderMap::new()), ResponseType::Opaque);
    }

    #[test]
    fn test_same_origin_redirect_stays_basic() {
        let origin = url("http://app.test/");
        let chain = [url("http://app.test/old"), url("http://app.test/new")];
        assert_eq!(classify(&origin, &chain, &HeaderMap::new()), ResponseType::Basic);
    }

    #[test]
    fn test_redirect_target_resolves_relative_location() {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("../login?next=/"));
        let next = redirect_target(&url("http://app.test/static/page"), &headers).unwrap();
        assert_eq!(next.as_str(), "http://app.test/login?next=/");

        headers.insert(header::LOCATION, HeaderValue::from_static("mailto:help@app.test"));
        assert!(redirect_target(&url("http://app.test/"), &headers).is_none());
        assert!(redirect_target(&url("http://app.test/"), &HeaderMap::new()).is_none());
    }

    #[test]
    fn test_cross_origin_with_wildcard_is_cors() {
        let origin = url("http://app.test/");
        let target = url("https://cdn.test/bootstrap.min.css");
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        assert_eq!(classify(&origin, &[target], &headers), ResponseType::Cors);
    }

    #[test]
    fn test_cross_origin_with_matching_origin_is_cors() {
        let origin = url("http://app.test:5000/");
        let target = url("https://cdn.test/leaflet.css");
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("http://app.test:5000"));
        assert_eq!(classify(&origin, &[target], &headers), ResponseType::Cors);
    }

    #[test]
    fn test_cross_origin_for_other_site_is_opaque() {
        let origin = url("http://app.test/");
        let target = url("https://cdn.test/leaflet.css");
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://other.test"));
        assert_eq!(classify(&origin, &[target], &headers), ResponseType::Opaque);
    }

    #[test]
    fn test_flatten_headers_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append(header::VARY, HeaderValue::from_static("Accept-Encoding"));
        headers.append(header::VARY, HeaderValue::from_static("Accept-Language"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));

        let flat = flatten_headers(&headers);
        assert_eq!(flat.get("vary").map(String::as_str), Some("Accept-Encoding, Accept-Language"));
        assert_eq!(flat.get("content-type").map(String::as_str), Some("text/css"));
    }
}
