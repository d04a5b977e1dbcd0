//! Overpass interpreter access: HTTP sources and the staging-file fetcher.
#![forbid(unsafe_code)]

mod error;
mod fetch;
mod source;

#[doc(hidden)]
pub mod test_support;

pub use error::{FetchError, TransportError};
pub use fetch::{CHUNK_BYTES, FetchReport, OverpassFetcher};
pub use source::{HttpOverpassSource, OverpassSource};
