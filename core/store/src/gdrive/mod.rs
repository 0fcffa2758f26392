//! Google Drive store for cloudstore.
//!
//! This module provides a store backend using Google Drive with:
//! - OAuth2 authentication with automatic token refresh and persistence
//! - Path-to-ID resolution rooted at the application data folder
//! - Multipart uploads with optional chunk tagging

pub mod client;
pub mod provider;

pub use client::{DriveClient, DriveEndpoints, DriveFile};
pub use provider::{GDriveConfig, GDriveStore};
