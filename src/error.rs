// src/error.rs
//! Recoverable error taxonomy. None of these abort a run; they are logged at
//! the point of recovery and, for harvesting, collected into the outcome.
//! Run-level failures are plain `anyhow::Error`s.

use thiserror::Error;

/// An image (spawn or corpus) could not be retrieved or decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode image from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("normalization task for {url} did not complete: {reason}")]
    Join { url: String, reason: String },
}

/// Why a catch message's category could not be extracted.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CatchParseError {
    #[error("catch prefix not found")]
    MissingPrefix,
    #[error("no '!' after the catch prefix")]
    Unterminated,
    #[error("category name is empty")]
    Empty,
}

/// A recognized spawn/catch event that lacks something it always carries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("spawn {id} has no image attachment")]
    SpawnWithoutAttachment { id: String },

    #[error("catch {id} is not a reply to any message")]
    CatchWithoutReply { id: String },

    #[error("catch {id} has an unreadable category: {reason}")]
    UnparsableCatch { id: String, reason: CatchParseError },
}

/// Data that parsed fine but disagrees with the catalog or the history.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataIntegrityWarning {
    #[error("category '{category}' (event {id}) does not exist in the catalog")]
    UnknownCategory { id: String, category: String },

    #[error("catch {id} replies to {spawn_id}, which is not a recorded spawn")]
    CatchForUnknownSpawn { id: String, spawn_id: String },
}

/// Everything the harvester can recover from, in one list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarvestWarning {
    #[error(transparent)]
    Malformed(#[from] MalformedEvent),
    #[error(transparent)]
    Integrity(#[from] DataIntegrityWarning),
}

/// Catalog files that would make alias resolution ambiguous or non-idempotent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog has no categories")]
    Empty,
    #[error("category '{0}' is listed more than once")]
    DuplicateCategory(String),
    #[error("alias '{alias}' points at unknown category '{target}'")]
    AliasTargetUnknown { alias: String, target: String },
    #[error("alias '{0}' has the same name as a category")]
    AliasShadowsCategory(String),
}
