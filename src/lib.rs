//! # Weaviate Skills
//!
//! A command-line companion for hosted Weaviate clusters, built so that an
//! AI agent (or a person) can inspect collections, import data, fetch
//! objects with structured filters, and run keyword, semantic and hybrid
//! searches. Ranking, indexing and vectorization all happen in the cluster.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────────┐   ┌──────────────┐
//! │  wsk (CLI)   │──▶│  weaviate-skills-core  │   │   Weaviate   │
//! │  commands    │   │  filter · query · ...  │   │   cluster    │
//! └──────┬───────┘   └────────────────────────┘   └──────▲───────┘
//!        │                                               │
//!        └──────────── QueryService ──▶ WeaviateClient ──┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export WEAVIATE_URL=https://my-cluster.weaviate.cloud
//! export WEAVIATE_API_KEY=...
//! wsk collections list
//! wsk fetch Product --filters '[{"property":"price","operator":"less_than","value":50}]'
//! wsk search hybrid --query "solar energy" --collection Article --alpha 0.5
//! wsk filter check '{"property":"year","operator":"greater_than","value":2000}' --graphql
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`client`] | HTTP implementation of the query service |
//! | [`output`] | Markdown and JSON rendering |
//! | [`collections`] | `collections list/get/create` |
//! | [`fetch`] | Filtered and by-id object retrieval |
//! | [`search`] | Keyword, semantic and hybrid search |
//! | [`import`] | CSV / JSON / JSONL import |
//! | [`filter_cmd`] | Offline filter checking and evaluation |

pub mod client;
pub mod collections;
pub mod config;
pub mod fetch;
pub mod filter_cmd;
pub mod import;
pub mod output;
pub mod search;
