pub mod client;
pub mod series;

pub use client::{HttpQueryClient, QueryClient, NANOSECOND_PRECISION};
pub use series::{parse_series, Series};
