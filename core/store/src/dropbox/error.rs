//! Dropbox endpoint error decoding.
//!
//! Dropbox reports endpoint-specific failures as HTTP 409 with a JSON body
//! whose `error` member is a `.tag`-discriminated union. Each operation
//! reads the tag at its own location in that union and matches it against
//! the small set of tags the store contract distinguishes.

use serde_json::Value;
use std::fmt;

use cloudstore_common::Error;

/// Endpoint whose error union is being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Download,
    Upload,
    CreateFolder,
    Delete,
    ListFolder,
    /// Lookup of the parent folder before a write.
    CheckParent,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Download => "download",
            Operation::Upload => "upload",
            Operation::CreateFolder => "make dir",
            Operation::Delete => "remove",
            Operation::ListFolder => "get list",
            Operation::CheckParent => "check parent",
        };
        f.write_str(name)
    }
}

/// Recognized endpoint failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// `path/not_found` or `path_lookup/not_found`.
    NotFound,
    /// `reason/conflict` (upload) or `path/conflict` (create folder).
    Conflict,
    /// `reason/malformed_path` (upload).
    MalformedPath,
    /// `reason/insufficient_space` (upload) or `path/insufficient_space`
    /// (create folder).
    InsufficientSpace,
    /// Any other tag, or the raw body when no tag could be read.
    Other(String),
}

impl ApiError {
    /// Decode a 409 response body for `op`.
    pub fn decode(op: Operation, body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return ApiError::Other(body.to_string()),
        };

        match op {
            Operation::Download | Operation::ListFolder | Operation::CheckParent => {
                match tag_at(&value, "/error/path/.tag") {
                    Some("not_found") => ApiError::NotFound,
                    Some(tag) => ApiError::Other(tag.to_string()),
                    None => ApiError::Other(body.to_string()),
                }
            }
            Operation::Upload => match tag_at(&value, "/error/reason/.tag") {
                Some("conflict") => ApiError::Conflict,
                Some("malformed_path") => ApiError::MalformedPath,
                Some("insufficient_space") => ApiError::InsufficientSpace,
                Some(tag) => ApiError::Other(tag.to_string()),
                None => ApiError::Other(body.to_string()),
            },
            Operation::CreateFolder => match tag_at(&value, "/error/path/.tag") {
                Some("conflict") => ApiError::Conflict,
                Some("insufficient_space") => ApiError::InsufficientSpace,
                Some(tag) => ApiError::Other(tag.to_string()),
                None => ApiError::Other(body.to_string()),
            },
            Operation::Delete => match tag_at(&value, "/error/.tag") {
                Some("path_lookup") => match tag_at(&value, "/error/path_lookup/.tag") {
                    Some("not_found") => ApiError::NotFound,
                    Some(tag) => ApiError::Other(tag.to_string()),
                    None => ApiError::Other("path_lookup".to_string()),
                },
                Some("path_write") => match tag_at(&value, "/error/path_write/.tag") {
                    Some(tag) => ApiError::Other(tag.to_string()),
                    None => ApiError::Other("path_write".to_string()),
                },
                Some(tag) => ApiError::Other(tag.to_string()),
                None => ApiError::Other(body.to_string()),
            },
        }
    }

    /// Translate into the shared error taxonomy.
    pub fn into_error(self, op: Operation) -> Error {
        match self {
            ApiError::NotFound => Error::NoEntry(format!("{} fail", op)),
            ApiError::Conflict => Error::DuplicateEntry(format!("{} fail: duplicate entry", op)),
            ApiError::MalformedPath => Error::NoEntry(format!("{} fail: wrong path", op)),
            ApiError::InsufficientSpace => Error::DiskFull(format!("{} fail", op)),
            ApiError::Other(reason) => {
                Error::Provider(format!("{} fail : reason = {}", op, reason))
            }
        }
    }
}

fn tag_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}
