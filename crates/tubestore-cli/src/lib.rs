//! tubestore CLI library.
//!
//! Argument parsing and command handlers for the `tubestore` binary.

pub mod cli;
pub mod commands;
