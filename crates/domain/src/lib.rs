//! Shared types for RecordBot: the error type, provider-agnostic
//! conversation messages, host thread messages, configuration and
//! structured trace events.

pub mod config;
pub mod error;
pub mod thread;
pub mod tool;
pub mod trace;
