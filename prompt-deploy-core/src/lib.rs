#![doc = "prompt-deploy-core: core logic library for prompt-deploy."]

//! This crate holds the whole prompt pipeline: path confinement, name
//! validation, config and template loading, rendering, model request building,
//! output writing and upload key/URL computation.
//!
//! Network access is behind the [`contract::ModelRuntime`] and
//! [`contract::ObjectStore`] traits. Concrete cloud clients live in the
//! `prompt-deploy` binary crate.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] from a [`pipeline::Layout`], a
//! [`generation::GenerationClient`] and an [`uploader::ObjectStoreUploader`],
//! then call [`pipeline::Pipeline::process_batch`].

pub mod config;
pub mod contract;
pub mod error;
pub mod generation;
pub mod names;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod template;
pub mod uploader;

pub use error::{PipelineError, Result};
