//! Image upload collaborator.
//!
//! The engine only ever sees the URL an upload produces; hosts pass it in
//! with `Intent::SetImageUrl`.

use super::{BoxFuture, PersistResult, PersistenceError};
use crate::entity::BoardId;
use base64::{Engine, engine::general_purpose::STANDARD};

/// Turns image bytes into a URL the renderer can load.
pub trait Uploader: Send + Sync {
    fn upload(
        &self,
        board: BoardId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, PersistResult<String>>;
}

/// Uploader that embeds the image as a `data:` URL instead of storing it remotely.
#[derive(Debug, Clone, Copy)]
pub struct InlineUploader {
    /// Largest payload accepted, in bytes.
    pub max_bytes: usize,
}

impl Default for InlineUploader {
    fn default() -> Self {
        Self { max_bytes: 2 * 1024 * 1024 }
    }
}

/// MIME type guessed from the file extension.
fn mime_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

impl Uploader for InlineUploader {
    fn upload(
        &self,
        _board: BoardId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, PersistResult<String>> {
        let mime = mime_for(file_name);
        let file_name = file_name.to_string();
        Box::pin(async move {
            let mime = mime.ok_or_else(|| {
                PersistenceError::Other(format!("Unsupported image type: {}", file_name))
            })?;
            if bytes.len() > self.max_bytes {
                return Err(PersistenceError::Other(format!(
                    "Image too large: {} bytes (limit {})",
                    bytes.len(),
                    self.max_bytes
                )));
            }
            Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
        })
    }
}
