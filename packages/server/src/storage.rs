//! Object storage over any S3-compatible HTTP endpoint.

use async_trait::async_trait;

use ingest::{IngestError, ObjectStore};

/// Stores objects with plain HTTP PUTs to `{endpoint}/{bucket}/{key}` and
/// returns `{public_base}/{key}` as the public URL.
///
/// Works against S3-compatible services that accept unsigned uploads
/// (MinIO, SeaweedFS, or a bucket behind a signing proxy).
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    public_base: String,
}

impl HttpObjectStore {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        public_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: trim_slashes(endpoint.into()),
            bucket: bucket.into(),
            public_base: trim_slashes(public_base.into()),
        }
    }
}

fn trim_slashes(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Percent-encode each path segment; keys contain titles with spaces and
/// punctuation.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> ingest::Result<String> {
        let encoded = encode_key(key);
        let target = format!("{}/{}/{}", self.endpoint, self.bucket, encoded);

        let response = self
            .client
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Upload {
                url: target,
                reason: format!("storage returned status {}", status),
            });
        }

        Ok(format!("{}/{}", self.public_base, encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_encoded_per_segment() {
        assert_eq!(
            encode_key("Solo Leveling/Chapter 1/abc.jpg"),
            "Solo%20Leveling/Chapter%201/abc.jpg"
        );
        // Slashes separate segments and survive.
        assert_eq!(encode_key("a/b"), "a/b");
    }

    #[test]
    fn base_urls_lose_trailing_slashes() {
        let store = HttpObjectStore::new(
            reqwest::Client::new(),
            "https://storage.example.com/",
            "manga",
            "https://cdn.example.com/",
        );
        assert_eq!(store.endpoint, "https://storage.example.com");
        assert_eq!(store.public_base, "https://cdn.example.com");
    }
}
