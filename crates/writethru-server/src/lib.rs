//! Write-through replication server for the writethru graph store.
//!
//! Mutation commands arriving on a session are applied to the local
//! [`AtomStore`](writethru_storage::AtomStore) and then replicated to every
//! connected backend target by the [`WriteThruProxy`](proxy::WriteThruProxy).
//! This crate holds the proxy, the command decoder and evaluator, the HTTP
//! host, and its configuration.

pub mod config;
pub mod decoder;
pub mod error;
pub mod eval;
pub mod handlers;
pub mod proxy;
pub mod router;
pub mod schema;
pub mod session;
pub mod state;
