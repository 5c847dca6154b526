//! Reading local files into submission and upload artifacts
//!
//! Provides:
//! - `read_artifact`: any file up to 10 MiB as a base64 `data:` URL
//! - `read_video_upload`: same, restricted to `video/*` files up to 4 MiB
//! - `decode_data_url`: the reverse, for exporting a stored submission

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::records::Submission;

/// Largest file accepted as an assignment submission
pub const MAX_ARTIFACT_SIZE: u64 = 10 * 1024 * 1024;

/// Largest file accepted as a module video
pub const MAX_VIDEO_SIZE: u64 = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a file")]
    NotAFile { path: PathBuf },

    #[error("file too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("expected a video file, got '{0}'")]
    NotVideo(String),

    #[error("not a data URL")]
    InvalidDataUrl,

    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// A file read into memory and encoded for storage
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    /// Media type guessed from the extension; empty when unknown
    pub file_type: String,
    pub data_url: String,
    pub size: u64,
}

impl From<Artifact> for Submission {
    fn from(artifact: Artifact) -> Self {
        Submission::File {
            name: artifact.name,
            file_type: artifact.file_type,
            data_url: artifact.data_url,
        }
    }
}

/// Guess a media type from the file extension
pub fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("ogv") => "video/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "",
    }
}

async fn read_limited(path: &Path, max: u64) -> Result<(Vec<u8>, u64), ArtifactError> {
    let read_err = |source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(read_err)?;
    if !metadata.is_file() {
        return Err(ArtifactError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let size = metadata.len();
    if size > max {
        return Err(ArtifactError::TooLarge { size, max });
    }

    let bytes = tokio::fs::read(path).await.map_err(read_err)?;
    Ok((bytes, size))
}

fn encode(path: &Path, file_type: &str, bytes: &[u8], size: u64) -> Artifact {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Artifact {
        name,
        file_type: file_type.to_string(),
        data_url: format!("data:{};base64,{}", file_type, BASE64.encode(bytes)),
        size,
    }
}

/// Read a file for an assignment submission
pub async fn read_artifact(path: impl AsRef<Path>) -> Result<Artifact, ArtifactError> {
    let path = path.as_ref();
    let (bytes, size) = read_limited(path, MAX_ARTIFACT_SIZE).await?;
    let artifact = encode(path, guess_media_type(path), &bytes, size);

    info!(
        path = %path.display(),
        size = size,
        file_type = %artifact.file_type,
        "Artifact read"
    );
    Ok(artifact)
}

/// Read a video file to embed in a course module
pub async fn read_video_upload(path: impl AsRef<Path>) -> Result<Artifact, ArtifactError> {
    let path = path.as_ref();
    let file_type = guess_media_type(path);
    if !file_type.starts_with("video/") {
        return Err(ArtifactError::NotVideo(file_type.to_string()));
    }

    let (bytes, size) = read_limited(path, MAX_VIDEO_SIZE).await?;
    Ok(encode(path, file_type, &bytes, size))
}

/// Split a `data:` URL into its media type and decoded bytes.
///
/// `fallback_type` is used when the URL carries no media type.
pub fn decode_data_url(data_url: &str, fallback_type: &str) -> Result<(String, Vec<u8>), ArtifactError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(ArtifactError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(ArtifactError::InvalidDataUrl)?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };
    let media_type = if media_type.is_empty() {
        fallback_type.to_string()
    } else {
        media_type.to_string()
    };

    let bytes = if is_base64 {
        BASE64.decode(payload.trim())?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((media_type, bytes))
}
