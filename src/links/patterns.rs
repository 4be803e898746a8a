use std::sync::LazyLock;

use regex::Regex;

/// Any shared link in free text: optional locale subdomain, kind segment, slug
/// and the optional share suffix the mobile app appends.
pub(super) static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https://(?:[a-z]{2}\.)?ifunny\.co/(picture|video|gif|meme|user)/[A-Za-z0-9_\-]+(?:\?s=cl)?",
    )
    .unwrap()
});

/// A single, well-formed profile link. Anchored on both ends.
pub(super) static USER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?:[a-z]{2}\.)?ifunny\.co/user/([A-Za-z0-9_\-]+)/?(?:\?[^\s]*)?$").unwrap()
});

/// Hex digest of a preview frame: `<hex>_<digit>.jpg`.
pub(crate) static PREVIEW_DIGEST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9a-f]+)_\d\.jpg").unwrap());

/// Hex digest and extension of any CDN asset path.
pub(crate) static ASSET_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([0-9a-f]+)(?:_\d)?\.(\w{3,4})$").unwrap());

/// Usernames accepted when a bare name is given instead of a link.
pub(super) static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap());
