//! Cache layer with sliding expiration.
//!
//! Entries live as long as they keep being read. An entry idle for longer
//! than the window is recomputed on its next lookup, so a hot key is never
//! refreshed by this layer; freshness of the data behind it is enforced by
//! the stores themselves.
//!
//! # Example
//!
//! ```ignore
//! let cache = SlidingCache::new(Duration::from_secs(300), clock, |name: &String| {
//!     resolve(name)
//! });
//! let first = cache.get(&"App1".to_string())?;
//! ```

pub mod sliding;
pub mod stats;

pub use sliding::SlidingCache;
pub use stats::CacheStats;
