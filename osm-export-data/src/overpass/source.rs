use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use osm_export_core::{OverpassQuery, OverpassSettings};
use reqwest::Client;
use tokio::io::AsyncWrite;
use tokio_util::io::StreamReader;

use super::{FetchError, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can execute an Overpass query and stream the response.
#[async_trait(?Send)]
pub trait OverpassSource {
    /// Interpreter endpoint, used in diagnostics.
    fn endpoint(&self) -> &str;
    /// POST `query` and copy the response body into `sink`, returning the
    /// number of bytes written.
    async fn post_query(
        &self,
        query: &OverpassQuery,
        sink: &mut (dyn AsyncWrite + Unpin),
    ) -> Result<u64, TransportError>;
}

/// HTTP implementation of [`OverpassSource`].
#[derive(Debug)]
pub struct HttpOverpassSource {
    client: Client,
    settings: OverpassSettings,
}

impl HttpOverpassSource {
    /// Build a client honouring the settings' timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn new(settings: OverpassSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(settings.user_agent())
            .connect_timeout(CONNECT_TIMEOUT.min(settings.timeout()))
            .timeout(settings.timeout())
            .build()
            .map_err(|source| FetchError::Client { source })?;
        Ok(Self { client, settings })
    }

    /// Settings the source was built with.
    #[must_use]
    pub const fn settings(&self) -> &OverpassSettings {
        &self.settings
    }

    fn classify(&self, error: &reqwest::Error) -> TransportError {
        let url = self.settings.url().to_string();
        if error.is_timeout() {
            return TransportError::Timeout {
                url,
                timeout_secs: self.settings.timeout_seconds(),
            };
        }
        if let Some(status) = error.status() {
            return TransportError::Http {
                url,
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        TransportError::Network {
            url,
            source: io::Error::other(error.to_string()),
        }
    }

    fn classify_stream(&self, error: io::Error) -> TransportError {
        let timed_out = error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);
        if timed_out || error.kind() == io::ErrorKind::TimedOut {
            return TransportError::Timeout {
                url: self.settings.url().to_string(),
                timeout_secs: self.settings.timeout_seconds(),
            };
        }
        TransportError::Network {
            url: self.settings.url().to_string(),
            source: error,
        }
    }
}

#[async_trait(?Send)]
impl OverpassSource for HttpOverpassSource {
    fn endpoint(&self) -> &str {
        self.settings.url().as_str()
    }

    async fn post_query(
        &self,
        query: &OverpassQuery,
        sink: &mut (dyn AsyncWrite + Unpin),
    ) -> Result<u64, TransportError> {
        let response = self
            .client
            .post(self.settings.url().clone())
            .body(query.to_string())
            .send()
            .await
            .map_err(|err| self.classify(&err))?
            .error_for_status()
            .map_err(|err| self.classify(&err))?;
        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = StreamReader::new(stream);
        tokio::io::copy(&mut reader, sink)
            .await
            .map_err(|err| self.classify_stream(err))
    }
}
