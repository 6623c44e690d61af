//! Jobwatch Core
//!
//! Core types and abstractions shared by the jobwatch daemon and CLI.
//!
//! This crate contains:
//! - Domain types: job identifiers, probe results, the watch-list
//! - DTOs: control protocol messages exchanged over the daemon socket
//! - Wire: length-prefixed JSON framing for those messages

pub mod domain;
pub mod dto;
pub mod wire;
