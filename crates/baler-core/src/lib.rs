//! # BalerDB
//!
//! A single-node, in-process TPC-C engine built around one question: how
//! small can the resident set stay under write pressure? The three
//! growing relations (Stock, Customer, OrderLine) live as per-tuple
//! compressed bitstrings behind learned per-relation models, spilling to
//! direct-I/O scratch files once a caller-chosen memory budget fills.
//! The small relations stay uncompressed in B+-trees for speed.
//!
//! ## Quick start
//!
//! ```no_run
//! use baler_core::db::TpccTables;
//! use baler_core::types::TablesConfig;
//!
//! // One warehouse, a 1 GiB budget, scratch files in ./baler-scratch.
//! let config = TablesConfig::new(1 << 30, "baler-scratch");
//! let mut tables = TpccTables::new(config).unwrap();
//! // ... bulk-load rows with insert_* ...
//! tables.mount_compressed(1).unwrap();
//! let low_stock = tables.stock_level(1, 1, 15).unwrap();
//! println!("{low_stock} items below threshold");
//! ```
//!
//! Execution is strictly single-threaded; shard by warehouse and run one
//! table set per shard if you want parallelism.

pub mod accountant;
pub mod btree;
pub mod db;
pub mod diskfile;
pub mod enums;
pub mod error;
pub mod model;
pub mod relation;
pub mod rows;
pub mod schema;
pub mod store;
pub mod types;
