//! Remote fetching.

use std::future::Future;

use log::debug;
use reqwest::header::CONTENT_TYPE;

use crate::error::FetchError;

pub const DEFAULT_USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));

/// Bytes and declared media type of one remote resource.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// Content type reported by the server, without parameters.
    pub media_type: Option<String>,
}

/// Something that can retrieve `http(s)://` resources.
pub trait Fetch {
    fn fetch<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<Fetched, FetchError>> + 'a;
}

/// [`Fetch`] over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<Fetched, FetchError>> + 'a {
        async move {
            let mut response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }

            let media_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(strip_parameters)
                .filter(|value| !value.is_empty());

            let mut bytes = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                bytes.extend_from_slice(&chunk);
            }

            debug!("Fetched {} bytes from '{url}'", bytes.len());
            Ok(Fetched { bytes, media_type })
        }
    }
}

/// `text/html; charset=utf-8` -> `text/html`
pub(crate) fn strip_parameters(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_parameters() {
        assert_eq!(strip_parameters("image/PNG"), "image/png");
        assert_eq!(strip_parameters("text/css; charset=utf-8"), "text/css");
        assert_eq!(strip_parameters(""), "");
    }

    #[test]
    fn test_default_user_agent_names_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("folio/"));
    }
}
