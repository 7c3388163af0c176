use rand::{Rng, distr::Alphanumeric};
use url::form_urlencoded;

/// Random value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Encodes `pairs` as an `application/x-www-form-urlencoded` query string.
pub fn query_string(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Formats milliseconds as `m:ss`.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Parses a track reference: a `spotify:track:` URI, an open.spotify.com link
/// or a bare track id. Returns the URI.
pub fn parse_track_uri(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(id) = input.strip_prefix("spotify:track:") {
        return is_track_id(id).then(|| input.to_string());
    }

    if let Some(rest) = input
        .strip_prefix("https://open.spotify.com/track/")
        .or_else(|| input.strip_prefix("http://open.spotify.com/track/"))
    {
        let id = rest.split(['?', '/']).next().unwrap_or_default();
        return is_track_id(id).then(|| format!("spotify:track:{}", id));
    }

    is_track_id(input).then(|| format!("spotify:track:{}", input))
}

fn is_track_id(id: &str) -> bool {
    id.len() == 22 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parses a playback position given as seconds (`95`) or `m:ss` (`1:35`) into
/// milliseconds. Positions too large to express in milliseconds are rejected.
pub fn parse_position(input: &str) -> Option<u64> {
    let input = input.trim();
    match input.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().ok()?;
            let seconds: u64 = seconds.parse().ok()?;
            if seconds >= 60 {
                return None;
            }
            minutes
                .checked_mul(60)?
                .checked_add(seconds)?
                .checked_mul(1000)
        }
        None => input.parse::<u64>().ok()?.checked_mul(1000),
    }
}
