//! In-memory [`OverpassSource`] used by unit and behaviour tests.

use std::cell::RefCell;

use async_trait::async_trait;
use osm_export_core::OverpassQuery;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{OverpassSource, TransportError};

const STUB_ENDPOINT: &str = "http://stub.invalid/api/interpreter";

/// Stub source returning canned bytes, optionally followed by a failure.
///
/// Every received query is recorded so tests can assert on what would have
/// been sent to the interpreter.
#[derive(Debug)]
pub struct StubOverpassSource {
    endpoint: String,
    body: Vec<u8>,
    failure: RefCell<Option<TransportError>>,
    received: RefCell<Vec<String>>,
}

impl StubOverpassSource {
    /// Respond with `body`.
    #[must_use]
    pub fn with_body(body: Vec<u8>) -> Self {
        Self {
            endpoint: STUB_ENDPOINT.to_owned(),
            body,
            failure: RefCell::new(None),
            received: RefCell::new(Vec::new()),
        }
    }

    /// Write `partial` and then fail with `error`.
    #[must_use]
    pub fn failing_after(partial: Vec<u8>, error: TransportError) -> Self {
        let stub = Self::with_body(partial);
        stub.failure.replace(Some(error));
        stub
    }

    /// Fail immediately with an HTTP status.
    #[must_use]
    pub fn with_status(status: u16) -> Self {
        Self::failing_after(
            Vec::new(),
            TransportError::Http {
                url: STUB_ENDPOINT.to_owned(),
                status,
                message: format!("HTTP status {status}"),
            },
        )
    }

    /// Queries received so far, in order.
    #[must_use]
    pub fn received_queries(&self) -> Vec<String> {
        self.received.borrow().clone()
    }
}

#[async_trait(?Send)]
impl OverpassSource for StubOverpassSource {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_query(
        &self,
        query: &OverpassQuery,
        sink: &mut (dyn AsyncWrite + Unpin),
    ) -> Result<u64, TransportError> {
        self.received.borrow_mut().push(query.to_string());
        sink.write_all(&self.body)
            .await
            .map_err(|source| TransportError::Network {
                url: self.endpoint.clone(),
                source,
            })?;
        if let Some(error) = self.failure.borrow_mut().take() {
            return Err(error);
        }
        Ok(u64::try_from(self.body.len()).unwrap_or(u64::MAX))
    }
}
