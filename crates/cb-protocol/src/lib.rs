#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Wire records exchanged between the cloudbuild control client and the
//! scheduler over the message broker.
//!
//! Layout:
//! - `request.rs`: build and info request payloads
//! - `response.rs`: response and info-response payloads plus status codes
//! - `error.rs`: decode errors raised at the deserialization boundary
//!
//! All records serialize as self-describing JSON maps so client and scheduler
//! versions can evolve independently. Decoding is strict: a missing required
//! field is an error, never a silent default.

pub mod error;
pub mod request;
pub mod response;

pub use error::{ProtocolError, ProtocolResult};
pub use request::{BuildAction, BuildRequest, InfoRequest};
pub use response::{InfoResponse, Response, ResponseCode};
