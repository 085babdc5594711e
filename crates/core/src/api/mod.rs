pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpApiClient, PricingApi};
pub use error::ApiError;
pub use types::{Health, QuoteAck};
