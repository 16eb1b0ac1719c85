//! Charter Sync - offline-first cache and sync layer for yacht charter operations
//!
//! This crate provides the core functionality for the `csync` CLI tool and
//! for applications embedding the sync layer.
//!
//! # Architecture
//!
//! - [`model`] - Record types and identity keys (vessels, bookings, checklists)
//! - [`storage`] - SQLite local cache
//! - [`remote`] - Remote store clients (HTTP, in-memory)
//! - [`sync`] - Hybrid read/write, reconciliation and legacy migration
//! - [`scheduler`] - Auto-refresh timer with overlap guard
//! - [`bus`] - Event bus for refresh and record-change notifications
//! - [`config`] - Configuration management
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod scheduler;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
