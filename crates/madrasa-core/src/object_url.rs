//! Mapping object URLs back to `(bucket, key)` pairs.
//!
//! Public objects are served under [`PUBLIC_OBJECT_PATH`] and signed links
//! under [`SIGNED_OBJECT_PATH`]; in both cases the remainder of the path is
//! `{bucket}/{key}` with the key percent-encoded.

use url::Url;

/// Path prefix for publicly readable objects.
pub const PUBLIC_OBJECT_PATH: &str = "/storage/v1/object/public/";

/// Path prefix for signed (token-bearing) object links.
pub const SIGNED_OBJECT_PATH: &str = "/storage/v1/object/sign/";

/// Bucket and key extracted from an object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

/// Extracts the URL path, accepting either an absolute URL or a bare path.
///
/// The returned path is still percent-encoded.
pub fn url_path(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url.path().to_string()),
        Err(_) if raw.starts_with('/') => {
            let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
            Some(without_query.to_string())
        }
        Err(_) => None,
    }
}

/// Strips `prefix` from the path of `raw`, percent-decodes the remainder and
/// splits it on the first `/` into bucket and key.
///
/// Returns `None` for empty input, a foreign prefix, malformed
/// percent-encoding, or an empty bucket or key.
pub fn parse_object_url(raw: &str, prefix: &str) -> Option<ObjectLocation> {
    let path = url_path(raw)?;
    let rest = path.strip_prefix(prefix)?;
    if !escapes_are_well_formed(rest) {
        return None;
    }
    let decoded = urlencoding::decode(rest).ok()?;
    let (bucket, key) = decoded.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some(ObjectLocation {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

/// Every `%` must start a two-digit hex escape.
fn escapes_are_well_formed(encoded: &str) -> bool {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Returns true when the URL carries a `token` query parameter.
pub fn has_token(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|url| url.query_pairs().any(|(k, v)| k == "token" && !v.is_empty()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_public_url() {
        let loc = parse_object_url(
            "https://cdn.example.com/storage/v1/object/public/media/schools/abc/icon/ff00.png",
            PUBLIC_OBJECT_PATH,
        )
        .unwrap();
        assert_eq!(loc.bucket, "media");
        assert_eq!(loc.key, "schools/abc/icon/ff00.png");
    }

    #[test]
    fn test_parse_decodes_percent_encoding() {
        let loc = parse_object_url(
            "https://x.test/storage/v1/object/public/media/posts/my%20photo.jpg",
            PUBLIC_OBJECT_PATH,
        )
        .unwrap();
        assert_eq!(loc.key, "posts/my photo.jpg");
    }

    #[test]
    fn test_parse_rejects_malformed_percent_encoding() {
        assert!(
            parse_object_url(
                "https://x.test/storage/v1/object/public/media/bad%FF%FEkey.png",
                PUBLIC_OBJECT_PATH,
            )
            .is_none()
        );
        for raw in [
            "https://x.test/storage/v1/object/public/media/bad%ZZkey.png",
            "https://x.test/storage/v1/object/public/media/trailing%",
            "https://x.test/storage/v1/object/public/media/short%4",
            "/storage/v1/object/public/media/bad%G1.png",
        ] {
            assert!(parse_object_url(raw, PUBLIC_OBJECT_PATH).is_none(), "{raw}");
        }
    }

    #[test]
    fn test_parse_rejects_missing_key_or_prefix() {
        assert!(parse_object_url("", PUBLIC_OBJECT_PATH).is_none());
        assert!(
            parse_object_url(
                "https://x.test/storage/v1/object/public/media",
                PUBLIC_OBJECT_PATH
            )
            .is_none()
        );
        assert!(
            parse_object_url(
                "https://x.test/storage/v1/object/public/media/",
                PUBLIC_OBJECT_PATH
            )
            .is_none()
        );
        assert!(parse_object_url("https://x.test/images/a.png", PUBLIC_OBJECT_PATH).is_none());
    }

    #[test]
    fn test_parse_accepts_bare_path() {
        let loc = parse_object_url(
            "/storage/v1/object/sign/media/a/b.png?token=abc",
            SIGNED_OBJECT_PATH,
        )
        .unwrap();
        assert_eq!(loc.key, "a/b.png");
    }

    #[test]
    fn test_has_token() {
        assert!(has_token(
            "https://x.test/storage/v1/object/sign/media/a.png?token=abc"
        ));
        assert!(!has_token(
            "https://x.test/storage/v1/object/sign/media/a.png?token="
        ));
        assert!(!has_token("https://x.test/storage/v1/object/sign/media/a.png"));
    }
}
