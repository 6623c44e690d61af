//! Core domain types
//!
//! This module contains the core domain structures used across jobwatch crates.
//! These types are shared between the daemon (which polls and supervises) and
//! the CLI (which edits the watch-list and reports status).

pub mod job;
pub mod watchlist;
