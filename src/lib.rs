//! Live visitor-chat server library.
//!
//! Implements a single-owner, multi-visitor support-chat router: visitors
//! join a FIFO queue, exactly one conversation is routed to the site owner
//! at a time, and every closed conversation's transcript is persisted to an
//! append-only text log.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// shared library
pub mod common;
