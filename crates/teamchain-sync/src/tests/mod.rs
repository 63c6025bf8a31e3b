//! Tests for the sync engine crate.
