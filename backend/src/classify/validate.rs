use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use shared::ClassifyRequestItem;
use url::Url;

/// Accepted image formats, matched case-insensitively against the final
/// extension of the URL path or the upload filename.
pub const ACCEPTED_FORMATS: [&str; 5] = ["jpg", "jpeg", "webp", "png", "gif"];

/// One validated image reference, consumed once by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageDescriptor {
    Url(Url),
    Inline { data: Vec<u8>, filename: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemError {
    pub index: usize,
    pub message: String,
}

/// Batch-level rejection carrying every offending item, not just the
/// first one.
#[derive(Debug, thiserror::Error)]
#[error("batch validation failed for {} item(s)", .items.len())]
pub struct ValidationError {
    pub items: Vec<ItemError>,
}

/// Validate a raw batch into descriptors. Pure; issues no network or
/// inference calls. Errors are collected across all items and any error
/// rejects the whole request.
pub fn validate_batch(
    items: &[ClassifyRequestItem],
) -> Result<Vec<ImageDescriptor>, ValidationError> {
    let mut descriptors = Vec::with_capacity(items.len());
    let mut errors = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match validate_item(item) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(messages) => {
                errors.extend(messages.into_iter().map(|message| ItemError { index, message }))
            }
        }
    }

    if errors.is_empty() {
        Ok(descriptors)
    } else {
        Err(ValidationError { items: errors })
    }
}

fn validate_item(item: &ClassifyRequestItem) -> Result<ImageDescriptor, Vec<String>> {
    match (&item.url, &item.inline_data) {
        (Some(_), Some(_)) => Err(vec![
            "Only one of url or inline_data may be provided".to_string(),
        ]),
        (None, None) => Err(vec![
            "Either url or inline_data must be provided".to_string(),
        ]),
        (Some(url), None) => validate_url_item(url),
        (None, Some(data)) => validate_inline_item(data, item.filename.as_deref()),
    }
}

fn validate_url_item(url: &str) -> Result<ImageDescriptor, Vec<String>> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return Err(vec!["url must be an absolute URL".to_string()]),
    };

    let last_segment = parsed.path().rsplit('/').next().unwrap_or("");
    if !has_accepted_extension(last_segment) {
        return Err(vec![
            "Only jpg, jpeg, webp, png, and gif image URLs are allowed".to_string(),
        ]);
    }

    Ok(ImageDescriptor::Url(parsed))
}

fn validate_inline_item(
    data: &str,
    filename: Option<&str>,
) -> Result<ImageDescriptor, Vec<String>> {
    let mut errors = Vec::new();

    let filename = match filename {
        Some(name) if has_accepted_extension(name) => Some(name),
        Some(_) => {
            errors.push(
                "Only jpg, jpeg, webp, png, and gif file formats are allowed".to_string(),
            );
            None
        }
        None => {
            errors.push("filename is required for inline uploads".to_string());
            None
        }
    };

    let decoded = match BASE64.decode(data) {
        Ok(bytes) => Some(bytes),
        Err(_) => {
            errors.push("inline_data is not valid base64".to_string());
            None
        }
    };

    match (filename, decoded) {
        (Some(name), Some(bytes)) => Ok(ImageDescriptor::Inline {
            data: bytes,
            filename: name.to_string(),
        }),
        _ => Err(errors),
    }
}

fn has_accepted_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, extension)) => {
            ACCEPTED_FORMATS.contains(&extension.to_ascii_lowercase().as_str())
        }
        None => false,
    }
}
