//! A small HTTP service that stores one profile photo per user.
//!
//! The photo bytes live in a [`BlobStore`](blobstore::BlobStore) filed under
//! the decimal string form of the user id; a small per-user metadata record
//! goes into a [`RecordStore`](recordstore::RecordStore). Both stores are
//! injected into the [`PhotoService`], which enforces the
//! at-most-one-photo-per-user invariant.

pub mod blobstore;
pub mod config;
pub mod errors;
pub mod fjall_impl;
pub mod http;
pub mod mem_impl;
pub mod recordstore;
pub mod service;

pub use errors::{Error, Result};
pub use service::{Photo, PhotoService};
