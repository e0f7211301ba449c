use super::validate::ImageDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("fetch failed: server returned {0}")]
    Status(reqwest::StatusCode),
}

/// Produce the raw byte payload for one validated descriptor. URL
/// images get a single GET with no retries; transient failures surface
/// as item-level errors upstream. Inline payloads are already buffered
/// by the validator.
pub async fn resolve(
    http: &reqwest::Client,
    descriptor: &ImageDescriptor,
) -> Result<Vec<u8>, ResolveError> {
    match descriptor {
        ImageDescriptor::Url(url) => {
            let response = http.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ResolveError::Status(status));
            }
            Ok(response.bytes().await?.to_vec())
        }
        ImageDescriptor::Inline { data, .. } => Ok(data.clone()),
    }
}
