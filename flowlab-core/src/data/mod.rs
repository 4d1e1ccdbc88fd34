//! Market data: provider trait, HTTP implementation, in-memory price
//! cache, and the concurrent prefetcher.

pub mod cache;
pub mod http;
pub mod prefetch;
pub mod provider;
pub mod scripted;

pub use cache::{CacheStats, DaySeries, PriceCache};
pub use http::AggsProvider;
pub use prefetch::Prefetcher;
pub use provider::{DataError, PricePage, PriceProvider, PriceTick};
pub use scripted::ScriptedProvider;
