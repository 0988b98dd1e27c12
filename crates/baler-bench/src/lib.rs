//! TPC-C driver pieces for BalerDB: the seeded random source, the data
//! generator, the transaction-mix client, the clock and the CSV dumper.
//! The `baler-bench` binary wires these together; they are a library so
//! the end-to-end tests can drive them directly.

pub mod client;
pub mod clock;
pub mod csv;
pub mod generator;
pub mod random;
