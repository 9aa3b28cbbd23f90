//! Play URL assembly and parsing
//!
//! Issued URLs always have the shape `{base}?path={remainder}&signature={token}`;
//! the cache re-validation path parses `signature` back out of that string.

use url::form_urlencoded;

pub fn build_play_url(base_url: &str, remainder: &str, token: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    // `~` is unreserved and stays literal.
    let path = form_urlencoded::byte_serialize(remainder.as_bytes())
        .collect::<String>()
        .replace("%7E", "~");

    let mut url = String::with_capacity(base.len() + path.len() + token.len() + 20);
    url.push_str(base);
    url.push_str("?path=");
    url.push_str(&path);
    url.push_str("&signature=");
    url.push_str(token);
    url
}

/// Value of the `signature` query parameter, if present and non-empty
pub fn signature_param(play_url: &str) -> Option<String> {
    let (_, query) = play_url.split_once('?')?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "signature")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
