//! Remote compression fallback.
//!
//! When the local codec cannot decode or encode a package, the work can be
//! handed to an external service. The calls here are the engine's only
//! suspension points.

pub mod codec;
pub mod fallback;

pub use codec::{FallbackCodec, LocalCodec, PackageCodec, RemoteCodec};
pub use fallback::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, RemoteCompressor, RetryPolicy};
