//! Dropbox store for cloudstore.
//!
//! Path-addressed adapter over the Dropbox v2 HTTP API. Endpoint failures
//! are decoded from their `.tag` unions in [`error`].

pub mod client;
pub mod error;
pub mod provider;

pub use client::{DropboxClient, DropboxEndpoints, DropboxEntry};
pub use error::{ApiError, Operation};
pub use provider::{dropbox_path, DropboxConfig, DropboxStore};
