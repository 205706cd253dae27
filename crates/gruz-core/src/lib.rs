//! Core domain + application logic for the freight marketplace backend.
//!
//! This crate is framework-agnostic. Postgres, HTTP and Telegram live behind
//! ports (traits) implemented in adapter crates.

pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod mapper;
pub mod messaging;
pub mod model;
pub mod ports;
pub mod query;
pub mod repository;
pub mod security;
pub mod service;
pub mod supervisor;
pub mod update;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::{Error, Result};
