//! Integration tests for pmlag-bot.
//!
//! These tests verify the interaction between components:
//! - Stream connection lifecycle against a local server
//! - Frame dispatch through parser, trackers and trigger

pub mod common;
