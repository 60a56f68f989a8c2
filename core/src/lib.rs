//! Core library for the FedServe orchestration server
//!
//! This crate contains the core business logic, including:
//! - Task lifecycle and run-state coordination
//! - Rule/scope-based authorization
//! - Cascade deletion across the registry and blob storage

pub mod auth;
pub mod blob;
pub mod error;
pub mod member;
pub mod registry;
pub mod run;
pub mod service;
pub mod task;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
