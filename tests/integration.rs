//! Integration tests.
//!
//! ```text
//! cargo test --test integration
//! ```
mod worker;
