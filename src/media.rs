//! Media URL resolver.
//!
//! Stored media references come in three styles and all rendering surfaces
//! need one canonical mapping to a browser-loadable URL:
//!
//! - `local:/images/photo.jpg` -> `/images/photo.jpg`
//! - `drive://1ABC123` -> Google Drive image/preview URL
//! - `https://drive.google.com/file/d/ABC/view` (or `?id=` sharing links,
//!   including `uc?id=` download links) -> Google Drive image/preview URL
//! - anything else -> returned unchanged
//!
//! Resolution is purely syntactic: no network calls and no check that the
//! referenced file exists or is public. A broken or private Drive file
//! resolves to a URL that fails to load client-side.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the caller intends to render the media as. Drives the Drive-id
/// mapping: images get a direct byte-stream URL usable in `<img>` tags,
/// PDFs and videos get the embeddable viewer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Pdf,
    Video,
}

lazy_static! {
    /// `/file/d/<fileId>` segment of a full Drive URL
    static ref DRIVE_FILE_REGEX: Regex = Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").unwrap();
    /// `?id=<fileId>` / `&id=<fileId>` query parameter on sharing links
    static ref DRIVE_ID_PARAM_REGEX: Regex = Regex::new(r"[?&]id=([a-zA-Z0-9_-]+)").unwrap();
}

/// Resolve a stored media reference to a URL a browser can load directly.
///
/// Recognition order, first match wins: empty input, `local:` prefix,
/// `drive://` id, `/file/d/<id>` link, `drive.google.com` link with an `id`
/// query parameter, pass-through. Never fails; already-direct URLs come back
/// unchanged, which also makes the function idempotent on its own output.
pub fn resolve_media_url(url: &str, media_type: MediaType) -> String {
    if url.is_empty() {
        return String::new();
    }

    if let Some(path) = url.strip_prefix("local:") {
        return path.to_string();
    }

    if let Some(file_id) = url.strip_prefix("drive://") {
        return drive_url(file_id, media_type);
    }

    if let Some(caps) = DRIVE_FILE_REGEX.captures(url) {
        return drive_url(&caps[1], media_type);
    }

    // `?id=` matches lots of non-Drive URLs, so require the Drive host too.
    if url.contains("drive.google.com") {
        if let Some(caps) = DRIVE_ID_PARAM_REGEX.captures(url) {
            return drive_url(&caps[1], media_type);
        }
    }

    url.to_string()
}

/// Resolve a batch of references with the same media type.
pub fn resolve_media_urls(urls: &[String], media_type: MediaType) -> Vec<String> {
    urls.iter()
        .map(|url| resolve_media_url(url, media_type))
        .collect()
}

/// Map a Drive file id to a loadable URL for the given media type.
fn drive_url(file_id: &str, media_type: MediaType) -> String {
    match media_type {
        // Embeddable viewer frame for PDFs and videos
        MediaType::Pdf | MediaType::Video => {
            format!("https://drive.google.com/file/d/{}/preview", file_id)
        }
        // Direct image byte stream, works in <img> tags
        MediaType::Image => format!("https://lh3.googleusercontent.com/d/{}", file_id),
    }
}

/// Whether the reference points at a local (public-folder) file.
pub fn is_local_file(url: &str) -> bool {
    url.starts_with("local:")
}

/// Whether the reference points at a Google Drive file in any form.
pub fn is_drive_file(url: &str) -> bool {
    url.starts_with("drive://") || url.contains("drive.google.com")
}

/// Extract the Drive file id from any recognized Drive reference form.
pub fn extract_drive_file_id(url: &str) -> Option<String> {
    if let Some(file_id) = url.strip_prefix("drive://") {
        return Some(file_id.to_string());
    }

    DRIVE_FILE_REGEX
        .captures(url)
        .or_else(|| DRIVE_ID_PARAM_REGEX.captures(url))
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_returns_empty() {
        assert_eq!(resolve_media_url("", MediaType::Image), "");
        assert_eq!(resolve_media_url("", MediaType::Pdf), "");
    }

    #[test]
    fn test_local_prefix_is_stripped() {
        assert_eq!(
            resolve_media_url("local:/images/a.jpg", MediaType::Image),
            "/images/a.jpg"
        );
    }

    #[test]
    fn test_drive_scheme_image() {
        assert_eq!(
            resolve_media_url("drive://ABC123", MediaType::Image),
            "https://lh3.googleusercontent.com/d/ABC123"
        );
    }

    #[test]
    fn test_drive_scheme_pdf_and_video_use_preview() {
        assert_eq!(
            resolve_media_url("drive://ABC123", MediaType::Pdf),
            "https://drive.google.com/file/d/ABC123/preview"
        );
        assert_eq!(
            resolve_media_url("drive://ABC123", MediaType::Video),
            "https://drive.google.com/file/d/ABC123/preview"
        );
    }

    #[test]
    fn test_full_drive_url() {
        assert_eq!(
            resolve_media_url(
                "https://drive.google.com/file/d/1XyZ_-9/view?usp=sharing",
                MediaType::Image
            ),
            "https://lh3.googleusercontent.com/d/1XyZ_-9"
        );
    }

    #[test]
    fn test_drive_sharing_link_with_id_param() {
        assert_eq!(
            resolve_media_url(
                "https://drive.google.com/open?id=1AbC_dEf",
                MediaType::Image
            ),
            "https://lh3.googleusercontent.com/d/1AbC_dEf"
        );
    }

    #[test]
    fn test_drive_uc_download_link() {
        assert_eq!(
            resolve_media_url(
                "https://drive.google.com/uc?export=download&id=FILE42",
                MediaType::Image
            ),
            "https://lh3.googleusercontent.com/d/FILE42"
        );
    }

    #[test]
    fn test_direct_url_passes_through_for_every_type() {
        let direct = "https://example.com/x.png";
        assert_eq!(resolve_media_url(direct, MediaType::Image), direct);
        assert_eq!(resolve_media_url(direct, MediaType::Pdf), direct);
        assert_eq!(resolve_media_url(direct, MediaType::Video), direct);
    }

    #[test]
    fn test_id_param_on_non_drive_host_is_not_rewritten() {
        let url = "https://example.com/page?id=12345";
        assert_eq!(resolve_media_url(url, MediaType::Image), url);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        for (input, media_type) in [
            ("drive://ABC123", MediaType::Image),
            ("drive://ABC123", MediaType::Pdf),
            ("local:/images/a.jpg", MediaType::Image),
            ("https://example.com/x.png", MediaType::Video),
        ] {
            let once = resolve_media_url(input, media_type);
            let twice = resolve_media_url(&once, media_type);
            assert_eq!(once, twice, "double resolution changed {:?}", input);
        }
    }

    #[test]
    fn test_batch_resolution() {
        let urls = vec![
            "drive://A".to_string(),
            "local:/b.png".to_string(),
            "https://example.com/c.gif".to_string(),
        ];
        assert_eq!(
            resolve_media_urls(&urls, MediaType::Image),
            vec![
                "https://lh3.googleusercontent.com/d/A".to_string(),
                "/b.png".to_string(),
                "https://example.com/c.gif".to_string(),
            ]
        );
    }

    #[test]
    fn test_predicates() {
        assert!(is_local_file("local:/a.jpg"));
        assert!(!is_local_file("/a.jpg"));
        assert!(is_drive_file("drive://X"));
        assert!(is_drive_file("https://drive.google.com/file/d/X/view"));
        assert!(!is_drive_file("https://example.com/x.png"));
    }

    #[test]
    fn test_extract_drive_file_id() {
        assert_eq!(extract_drive_file_id("drive://X1"), Some("X1".to_string()));
        assert_eq!(
            extract_drive_file_id("https://drive.google.com/file/d/Y2/view"),
            Some("Y2".to_string())
        );
        assert_eq!(
            extract_drive_file_id("https://drive.google.com/uc?id=Z3"),
            Some("Z3".to_string())
        );
        assert_eq!(extract_drive_file_id("https://example.com/x.png"), None);
    }
}
