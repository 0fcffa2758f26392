//! Cloud store abstraction for cloudstore.
//!
//! This crate provides a trait-based interface over cloud storage backends
//! (Google Drive, Dropbox) and a registry for resolving them by name.
//!
//! # Design Principles
//! - Provider isolation: each adapter owns its REST shaping and error decoding
//! - Shared taxonomy: provider failures translate into `NoEntry`,
//!   `DuplicateEntry`, `DiskFull` or an unclassified error
//! - Composed auth: adapters build on a common OAuth2 token manager that
//!   persists every token it obtains
//! - Sequential I/O: operations await their round-trips one after another
//!   and never retry

pub mod auth;
pub mod dropbox;
pub mod entry;
pub mod gdrive;
pub mod registry;
pub mod store;
pub mod token;

pub use auth::{AuthConfig, AuthManager, ProviderAuth, TokenManager};
pub use dropbox::{DropboxConfig, DropboxStore};
pub use entry::DirectoryEntry;
pub use gdrive::{GDriveConfig, GDriveStore};
pub use registry::{StoreFactory, StoreRegistry};
pub use store::Store;
pub use token::{TokenStore, Tokens};
