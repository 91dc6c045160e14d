//! Remote configuration documents.

use std::fs;
use std::time::Duration;

use url::Url;

use crate::document::ConfigDocument;
use crate::error::RemoteConfigError;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches the text of a remote configuration document.
pub trait RemoteSource {
    /// Returns the document body behind `url`.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be retrieved.
    fn fetch(&self, url: &Url) -> Result<String, RemoteConfigError>;

    /// Fetches and parses the document named by `raw_url`.
    ///
    /// # Errors
    ///
    /// Fails when the URL is malformed, the fetch fails, or the body is not
    /// a valid configuration document.
    fn load(&self, raw_url: &str) -> Result<ConfigDocument, RemoteConfigError> {
        let url = Url::parse(raw_url).map_err(|source| RemoteConfigError::InvalidUrl {
            url: raw_url.to_owned(),
            source,
        })?;
        let body = self.fetch(&url)?;
        Ok(ConfigDocument::parse(&body, url.as_str())?)
    }
}

/// Production fetcher for `file://` and `http(s)://` URLs.
#[derive(Debug, Clone)]
pub struct UrlRemoteSource {
    timeout: Duration,
}

impl UrlRemoteSource {
    /// Creates a fetcher with the given HTTP timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn fetch_file(url: &Url) -> Result<String, RemoteConfigError> {
        let path = url
            .to_file_path()
            .map_err(|()| RemoteConfigError::InvalidFilePath {
                url: url.to_string(),
            })?;
        fs::read_to_string(&path).map_err(|source| RemoteConfigError::Read { path, source })
    }

    fn fetch_http(&self, url: &Url) -> Result<String, RemoteConfigError> {
        let http_error = |source: reqwest::Error| RemoteConfigError::Http {
            url: url.to_string(),
            source,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(http_error)?;
        client
            .get(url.clone())
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(http_error)
    }
}

impl Default for UrlRemoteSource {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl RemoteSource for UrlRemoteSource {
    fn fetch(&self, url: &Url) -> Result<String, RemoteConfigError> {
        match url.scheme() {
            "file" => Self::fetch_file(url),
            "http" | "https" => self.fetch_http(url),
            scheme => Err(RemoteConfigError::UnsupportedScheme {
                scheme: scheme.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use mockall::mock;
    use mockall::predicate::eq;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    mock! {
        Source {}
        impl RemoteSource for Source {
            fn fetch(&self, url: &Url) -> Result<String, RemoteConfigError>;
        }
    }

    #[rstest]
    fn load_parses_fetched_body() {
        let mut source = MockSource::new();
        let url = Url::parse("http://config.example/sluice.toml").expect("url");
        source
            .expect_fetch()
            .with(eq(url))
            .times(1)
            .returning(|_| Ok("[sluice]\ndaemon = true\n".to_owned()));

        let document = source
            .load("http://config.example/sluice.toml")
            .expect("remote document");

        assert_eq!(document.origin(), "http://config.example/sluice.toml");
    }

    #[rstest]
    fn malformed_url_is_rejected_before_fetching() {
        let mut source = MockSource::new();
        source.expect_fetch().never();
        let error = source.load("not a url").expect_err("invalid url");
        assert!(matches!(error, RemoteConfigError::InvalidUrl { .. }));
    }

    #[rstest]
    fn malformed_body_is_a_document_error() {
        let mut source = MockSource::new();
        source
            .expect_fetch()
            .returning(|_| Ok("daemon = true\n".to_owned()));
        let error = source.load("http://config.example/").expect_err("no table");
        assert!(matches!(error, RemoteConfigError::Document(_)));
    }

    #[rstest]
    fn unsupported_scheme_is_rejected() {
        let error = UrlRemoteSource::default()
            .load("ftp://config.example/sluice.toml")
            .expect_err("unsupported scheme");
        assert!(matches!(error, RemoteConfigError::UnsupportedScheme { scheme } if scheme == "ftp"));
    }

    #[rstest]
    fn file_urls_read_local_documents() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("remote.toml");
        fs::write(&path, "[sluice]\ndefault-username = \"remote\"\n").expect("write document");
        let url = Url::from_file_path(&path).expect("file url");

        let document = UrlRemoteSource::default()
            .load(url.as_str())
            .expect("file document");

        assert_eq!(document.origin(), url.as_str());
    }

    #[rstest]
    fn missing_file_is_a_read_error() {
        let error = UrlRemoteSource::default()
            .load("file:///nonexistent/sluice-remote.toml")
            .expect_err("missing file");
        assert!(matches!(error, RemoteConfigError::Read { .. }));
    }
}
