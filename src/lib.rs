//! Paginated SPARQL result dumper.
//!
//! Runs a query template with `%(offset)s` / `%(limit)s` placeholders against a
//! SPARQL endpoint one page at a time and merges every page into a single
//! SPARQL 1.1 JSON results document.

pub mod config;
mod error;
mod macros;
mod parse;
pub mod process;
pub mod request;
pub mod result;
pub mod retry;
pub mod template;

pub use config::DumpConfig;
pub use error::{Error, FetchError, PageError, Result};
pub use parse::{BindingRow, Page};
pub use process::{Aggregator, FetchProgress, FetchRequest};
pub use request::{HttpEndpoint, QueryEndpoint};
pub use result::AggregateResult;
pub use retry::RetryPolicy;
pub use template::QueryTemplate;
