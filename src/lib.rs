/// Configuration management
pub mod config;

/// Client for the upstream node's `getnodestate` JSON-RPC method
pub mod rpc;

/// Node state and status code mapping
pub mod state;

/// HTTP server exposing the scrape endpoint
pub mod server;

/// Application telemetry, logging and exported metrics
pub mod telemetry;

/// Build version information
pub mod version;
