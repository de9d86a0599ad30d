//! # Weaviate Skills Core
//!
//! Pure logic shared by the `wsk` command line: the filter expression
//! engine, collection and query models, GraphQL construction, import
//! record normalization, and the query service abstraction.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! runtime-bound dependencies. Everything that talks to the network lives
//! in the application crate behind [`service::QueryService`].

pub mod filter;
pub mod models;
pub mod query;
pub mod records;
pub mod schema;
pub mod service;
