//! Shared test utilities for mailgrab integration tests.
//!
//! This module provides:
//! - `FakeMailbox`, an in-memory `MailSession` that records every command
//! - Builders for raw RFC 5322 messages

pub mod builders;
pub mod fake;

pub use builders::*;
pub use fake::{Call, FakeMailbox};
