//! YouTube link normalization for module videos

use url::Url;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

fn embed(id: &str) -> String {
    format!("https://www.youtube.com/embed/{}", id)
}

/// Rewrite a YouTube watch, short or share link into its embeddable form.
///
/// Anything that is not a recognizable YouTube link comes back trimmed but
/// otherwise unchanged.
pub fn normalize_youtube_embed_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let Ok(url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return raw.to_string();
    }

    let path = url.path();
    if host == "youtu.be" {
        let id = path.strip_prefix('/').unwrap_or(path).trim();
        return if id.is_empty() { raw.to_string() } else { embed(id) };
    }

    if path.starts_with("/embed/") {
        return raw.to_string();
    }

    if let Some(rest) = path.strip_prefix("/shorts/") {
        let id = rest.split('/').next().unwrap_or_default().trim();
        return if id.is_empty() { raw.to_string() } else { embed(id) };
    }

    match url.query_pairs().find(|(key, _)| key == "v") {
        Some((_, id)) if !id.is_empty() => embed(&id),
        _ => raw.to_string(),
    }
}
