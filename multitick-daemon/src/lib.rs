//! multitick daemon library
//!
//! This module re-exports the daemon's modules for integration testing.

pub mod cli;
pub mod config;
pub mod events;
pub mod runner;
