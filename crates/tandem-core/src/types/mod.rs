//! Shared types: actions, paths, documents, outputs, and stream contracts.

pub mod action;
pub mod document;
pub mod output;
pub mod path;
pub mod stream;

pub use action::{ActionName, ActionType, OnErrorPolicy};
pub use document::{
    DocMetadata, Document, OnAddedFn, OnModifiedFn, OnRemovedFn, RetrievedDoc, deep_merge,
    to_document,
};
pub use output::{ActionOutput, GetResponse};
pub use path::ModulePath;
pub use stream::{NextStoresStream, StopFn, StoreStream, StreamDeleteFn, StreamWriteFn};
