//! Host-side integration tests.
//!
//! Run with `cargo test`.  Everything here drives the library through its
//! port traits with in-memory hardware from [`mock_hw`].

mod mock_hw;
mod register_channel_tests;
