//! Tower middleware around the network exchange.
//!
//! Layers added with [`crate::ClientBuilder::layer`] wrap the boxed
//! transport service. The first layer added is the outermost.
//!
//! # Available Layers
//!
//! - [`LoggingLayer`] - logs each exchange using `tracing`
//! - [`ConcurrencyLimitLayer`] - caps concurrent exchanges (from tower)
//!
//! Any other tower layer over [`crate::BoxedService`] works as well.
//!
//! # Example
//!
//! ```
//! use tandem::Client;
//! use tandem::middleware::{ConcurrencyLimitLayer, LoggingLayer};
//!
//! let client = Client::builder()
//!     .layer(LoggingLayer::default())
//!     .layer(ConcurrencyLimitLayer::new(8))
//!     .build();
//! ```

mod logging;

pub use logging::{Logging, LoggingLayer, Verbosity};

// Re-export tower types for convenience
pub use tower::limit::ConcurrencyLimitLayer;
pub use tower::{Layer, ServiceBuilder};
