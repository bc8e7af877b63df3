//! Response cache with explicit expiry and stale-on-error reads.
//!
//! # Design
//!
//! Reads go through [`CachedRetriever`], which answers from a valid
//! [`CacheEntry`] when it can and calls the [`vitrine_core::DataProvider`]
//! otherwise. When the provider fails, any stored entry for the key is
//! returned instead of the error, tagged [`ReadSource::Stale`].
//!
//! The store is unbounded and never evicts on its own. Writes elsewhere are
//! reflected only when the caller invalidates through
//! [`InvalidationController`].
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(CacheStore::new());
//! let retriever = CachedRetriever::with_defaults(store.clone(), provider);
//!
//! let categories: Vec<Category> = retriever
//!     .fetch_cached("/categories", &FetchOptions::new().max_age(Duration::from_secs(60)), None)
//!     .await?;
//!
//! InvalidationController::new(store).clear(Some(&Regex::new("/products")?))?;
//! ```

pub mod entry;
pub mod invalidation;
pub mod key;
pub mod retriever;
pub mod stats;
pub mod store;

pub use entry::{CacheEntry, CacheRead, ReadSource};
pub use invalidation::InvalidationController;
pub use key::CacheKey;
pub use retriever::{CacheConfig, CachedRetriever, FetchOptions};
pub use stats::{format_size, CacheReport, ReadStats, StatsReporter};
pub use store::{CacheStore, StoreStats};
