//! Data Transfer Objects for daemon control
//!
//! This module contains the messages exchanged between the CLI and the
//! running daemon over the control socket.

pub mod control;
