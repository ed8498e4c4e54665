//! # HMS Common Library
//!
//! Shared code for HMS services:
//! - Error type
//! - Bootstrap configuration loading
//! - Database initialization
//! - Bearer token validation

pub mod auth;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
