use chrono::{NaiveDateTime, Utc};
use image::ImageFormat;
use rocket::fs::TempFile;
use rocket::tokio::fs;
use rocket::tokio::io::AsyncReadExt;
use serde::Serializer;
use slug::slugify;
use std::io;
use std::path::Path;

pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.format("%d %b %Y %H:%M").to_string();
    serializer.serialize_str(&s)
}

pub fn profile_path(username: &str) -> String {
    format!("/{}/", urlencoding::encode(username))
}

pub fn post_path(username: &str, post_id: i32) -> String {
    format!("/{}/{}/", urlencoding::encode(username), post_id)
}

/// Login page that sends the user back to `next` afterwards.
pub fn login_path(next: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(next))
}

/// Reads a whole uploaded file into memory.
pub async fn read_upload(file: &TempFile<'_>) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(file.len() as usize);
    let reader = file.open().await?;
    rocket::tokio::pin!(reader);
    reader.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

/// Detects the format of an uploaded image and checks that it decodes.
pub fn decode_image(bytes: &[u8]) -> Option<ImageFormat> {
    let format = image::guess_format(bytes).ok()?;
    match image::load_from_memory_with_format(bytes, format) {
        Ok(_) => Some(format),
        Err(e) => {
            tracing::debug!("rejected {:?} upload: {}", format, e);
            None
        }
    }
}

/// Writes an image under `media_root/posts/` and returns its path relative to
/// the media root. The extension follows the detected format.
pub async fn store_image(
    bytes: &[u8],
    format: ImageFormat,
    name: Option<&str>,
    media_root: &Path,
) -> io::Result<String> {
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let stem = name
        .map(slugify)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "image".to_owned());

    let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
    let relative = format!("posts/{}-{}.{}", stamp, stem, extension);
    let target = media_root.join(&relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&target, bytes).await?;
    Ok(relative)
}
