//! Core types and logic for the Vansh genealogy graph.
//!
//! Person records are kept flat and keyed by id. From a snapshot of them this
//! crate derives the clan tree, drives the lineage wizard that edits it, and
//! lays out the whole graph for free-form exploration.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage, identity and blob backends plug in through traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod candidates;
pub mod clan;
pub mod error;
pub mod graph;
pub mod identity;
pub mod layout;
pub mod memory;
pub mod ops;
pub mod person;
pub mod photo;
pub mod profile;
pub mod session;
pub mod store;
pub mod tree;
pub mod wizard;

pub use error::{Error, Result};
