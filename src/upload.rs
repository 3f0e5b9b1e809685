// src/upload.rs

//! Multipart form parsing for the post and profile forms.

use std::collections::HashMap;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::{blob::BlobError, error::AppError, utils::text::non_blank};

/// An uploaded image whose format has been checked.
#[derive(Debug, Clone)]
pub struct ImagePart {
    /// Normalized file extension (`jpg` or `png`).
    pub extension: &'static str,
    pub bytes: Bytes,
}

/// Text fields and image parts of a multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    images: Vec<ImagePart>,
}

impl MultipartForm {
    /// Reads every part. Parts named in `image_fields` are treated as images
    /// (at most `max_images`), everything else as text.
    pub async fn parse(
        mut multipart: Multipart,
        image_fields: &[&str],
        max_images: usize,
    ) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if image_fields.contains(&name.as_str()) {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;

                // Browsers send an empty part when no file was picked.
                if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
                    continue;
                }

                if form.images.len() == max_images {
                    return Err(AppError::BadRequest(format!(
                        "At most {} images are allowed",
                        max_images
                    )));
                }

                let extension = image_extension(file_name.as_deref(), content_type.as_deref())?;
                form.images.push(ImagePart { extension, bytes });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Takes a text field, trimmed; blank values count as absent.
    pub fn text(&mut self, name: &str) -> Option<String> {
        non_blank(self.fields.remove(name))
    }

    pub fn take_images(&mut self) -> Vec<ImagePart> {
        std::mem::take(&mut self.images)
    }
}

/// Accepts jpg, jpeg and png, judged by content type first and file name second.
pub fn image_extension(
    file_name: Option<&str>,
    content_type: Option<&str>,
) -> Result<&'static str, BlobError> {
    match content_type.map(str::to_ascii_lowercase).as_deref() {
        Some("image/jpeg" | "image/jpg") => return Ok("jpg"),
        Some("image/png") => return Ok("png"),
        _ => {}
    }

    let extension = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg" | "jpeg") => Ok("jpg"),
        Some("png") => Ok("png"),
        _ => Err(BlobError::UnsupportedFormat(
            file_name
                .or(content_type)
                .unwrap_or("unnamed upload")
                .to_string(),
        )),
    }
}
