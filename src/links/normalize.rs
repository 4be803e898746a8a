use url::Url;

/// Query parameters that ask the asset host for a resized or cropped variant.
const TRANSFORM_PARAMS: &[&str] = &[
    "crop", "resize", "quality", "format", "width", "height", "w", "h", "size", "scale",
];

/// Operations accepted inside an image-proxy path segment such as
/// `crop:x-20,resize:640x,quality:90x75`.
const TRANSFORM_OPERATIONS: &[&str] = &["crop", "resize", "quality", "format", "blur", "rotate"];

/// Strip server-side transforms from a CDN asset URL so the original asset is
/// requested.
///
/// Proxy transform segments are removed from the path and, when any were
/// present on an `imageproxy.*` host, the host is swapped for `cdn_host`.
/// Transform query parameters are dropped; unrelated parameters survive.
/// Unparseable input is returned unchanged.
#[must_use]
pub fn strip_cdn_transforms(url: &str, cdn_host: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return url.to_string();
    }

    // Remove transform parameters
    let kept_params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_transform_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if kept_params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept_params.iter());
    }

    // Remove proxy transform segments
    let segments: Vec<String> = parsed
        .path_segments()
        .map(|s| s.map(str::to_string).collect())
        .unwrap_or_default();
    let kept_segments: Vec<&String> = segments
        .iter()
        .filter(|segment| !is_transform_segment(segment))
        .collect();

    if kept_segments.len() != segments.len() {
        let path = kept_segments
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("/");
        parsed.set_path(&format!("/{path}"));

        let on_proxy = parsed
            .host_str()
            .is_some_and(|host| host.starts_with("imageproxy."));
        if on_proxy {
            let _ = parsed.set_host(Some(cdn_host));
        }
    }

    parsed.to_string()
}

fn is_transform_param(key: &str) -> bool {
    TRANSFORM_PARAMS.contains(&key.to_lowercase().as_str())
}

fn is_transform_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.split(',').all(|part| {
            part.split_once(':')
                .is_some_and(|(op, _)| TRANSFORM_OPERATIONS.contains(&op))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDN: &str = "img.ifunny.co";

    #[test]
    fn test_strip_proxy_picture_transforms() {
        assert_eq!(
            strip_cdn_transforms(
                "https://imageproxy.ifunny.co/crop:x-20,resize:640x,quality:90x75/images/0a1b2c3d_1.jpg",
                CDN
            ),
            "https://img.ifunny.co/images/0a1b2c3d_1.jpg"
        );
    }

    #[test]
    fn test_strip_proxy_icon_transforms() {
        assert_eq!(
            strip_cdn_transforms(
                "https://imageproxy.ifunny.co/crop:square,resize:100x,quality:90/user_photos/57459299098918f644f560dc5e73e0c4a10c9495_0.webp",
                CDN
            ),
            "https://img.ifunny.co/user_photos/57459299098918f644f560dc5e73e0c4a10c9495_0.webp"
        );
    }

    #[test]
    fn test_strip_transform_query_params() {
        assert_eq!(
            strip_cdn_transforms("https://img.ifunny.co/images/abc_1.jpg?crop=1&resize=320", CDN),
            "https://img.ifunny.co/images/abc_1.jpg"
        );
    }

    #[test]
    fn test_keep_unrelated_query_params() {
        assert_eq!(
            strip_cdn_transforms("https://img.ifunny.co/videos/abc_1.mp4?token=xyz&w=300", CDN),
            "https://img.ifunny.co/videos/abc_1.mp4?token=xyz"
        );
    }

    #[test]
    fn test_untransformed_url_is_unchanged() {
        let url = "https://img.ifunny.co/images/abc_1.jpg";
        assert_eq!(strip_cdn_transforms(url, CDN), url);
    }

    #[test]
    fn test_segment_with_colon_but_unknown_op_is_kept() {
        let url = "https://img.ifunny.co/images/note:1/abc_1.jpg";
        assert_eq!(strip_cdn_transforms(url, CDN), url);
    }

    #[test]
    fn test_invalid_url_passthrough() {
        assert_eq!(strip_cdn_transforms("not a url", CDN), "not a url");
    }
}
