pub mod address;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod geocode;
mod html;
pub mod pipeline;
pub mod sanity;
#[cfg(test)]
mod testing;
pub mod types;

pub use address::{canonicalize_display, normalize_query, title_case_street, DisplayContext};
pub use error::{FetchError, GeocodeError, PipelineError};
pub use extract::{extract_records, FieldChain, FieldChains, FieldSource};
pub use fetch::{HttpGet, HttpResponse, ReqwestFetcher};
pub use formats::{parse_feed, sniff_format};
pub use geocode::{GeocodeProvider, GeocodeResolver, GoogleGeocoder, DEFAULT_GEOCODE_CACHE_TTL};
pub use pipeline::{FeedPipeline, DEFAULT_GEOCODE_CONCURRENCY};
pub use sanity::{haversine_miles, SanityCheck};
pub use types::{GeocodeQuery, GeocodeResult, IntermediateRecord, SourceRow};
