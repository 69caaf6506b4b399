//! Guarantor scheduling, eligibility checks, document storage and payout settlement for
//! rental operations, served over HTTP in front of a hosted Postgres/storage backend.

pub mod config;
pub mod context;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod http;
pub mod identity;
pub mod public;
pub mod resources;
pub mod scheduling;
pub mod settlement;
pub mod signings;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use context::AppContext;
pub use http::api_router;
