//! HTTP server for the DA proxy.
//!
//! Exposes the storage manager over HTTP: rollup clients post blobs and get
//! back encoded commitments, then read blobs back by commitment.

pub mod config;
pub mod error;
pub mod handler;
pub mod load;
pub mod router;
pub mod server;

pub use config::ProxyConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use load::load_store_manager;
pub use router::build_router;
pub use server::ProxyServer;
