//! Client for the overseas.ai job marketplace API.
//!
//! The backend owns all data; this crate keeps the client-side job feed:
//! filter state, paginated fetching with fallback sources, infinite-scroll
//! loading guarded against stale responses, and local text search over the
//! loaded jobs.

pub mod actions;
pub mod api;
pub mod cache;
pub mod card;
pub mod config;
pub mod error;
pub mod feed;
pub mod filter;
pub mod home;
pub mod models;
pub mod search;
pub mod session;
pub mod source;

pub use api::ApiClient;
pub use error::{ApiError, Result};
pub use feed::{Completion, FeedSnapshot, FeedState, FeedStatus, FetchTicket, PageState};
pub use filter::{ContractPeriod, ExperienceType, FilterPayload, FilterValue, PassportType, SortBy};
pub use models::{FlexibleId, JobListing, ListingPage};
pub use session::{FeedCommand, FeedHandle, FeedSession};
pub use source::{HttpJobSource, JobSource, ListingEndpoint, ListingRequest, SourceChain, PAGE_SIZE};
