#![doc = "media-backup-core: resumable chunked uploads to object storage and media APIs."]

//! This crate holds the upload protocol: session negotiation, the chunk uploader, the retry
//! policy and the two HTTP transports. The `media-backup` binary is only CLI glue around it.
//!
//! # Usage
//! Build a transport, wrap it in a [`uploader::ChunkUploader`] with a
//! [`retry::RetryPolicy`], then call [`backup::backup_files`] or
//! [`publish::publish_video`] (or [`uploader::ChunkUploader::upload`] directly).

pub mod backup;
pub mod config;
pub mod contract;
pub mod credential;
pub mod error;
pub mod progress;
pub mod publish;
pub mod retry;
pub mod session;
pub mod source;
pub mod transport;
pub mod uploader;
