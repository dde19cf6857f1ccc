//! `agekit-core` is the client of the age verification widget.
//!
//! A host implements [`Page`] for its surface, configures a [`VerificationClient`] with
//! [`VerificationOptions`] and calls [`VerificationClient::generate_qr_code`]. The client renders
//! the QR code, polls the status URL and fires the matching callback once the holder scanned,
//! approved or rejected the request. [`StateRenderer`] draws each state for hosts that want the
//! stock views, and [`embed`] mounts the whole widget from its embedding URL.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

/// Endpoints, header names and timing defaults.
pub mod defaults;

pub mod embed;

/// Forwards the crate's tracing events to a host-provided logger.
pub mod logger;

mod client;
pub use client::*;

mod dispatcher;
pub use dispatcher::*;

mod error;
pub use error::*;

mod log_entry;
pub use log_entry::*;

mod options;
pub use options::VerificationOptions;

mod page;
pub use page::*;

mod renderer;
pub use renderer::*;

mod state;
pub use state::*;

// private modules
mod http_request;
mod poller;
