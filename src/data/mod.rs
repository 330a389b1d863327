//! Data layer module
//!
//! Handles everything that touches the hosted backend:
//! - Backend-neutral request model
//! - Remote data service trait, PostgREST client, in-memory backend
//! - Record validation at the boundary
//! - Popular tag and recent activity caches (volatile)

mod cache;
pub mod memory;
mod models;
pub mod postgrest;
pub mod request;
mod service;

pub use cache::{
    Activity, ActivityKind, MAX_ACTIVITIES, PopularTagsCache, RecentActivityCache, TagCount,
};
pub use memory::{FailOp, MemoryDataService};
pub use models::*;
pub use postgrest::PostgrestDataService;
pub use request::{Expr, Op, Order, Select, Table, Value, Window};
pub use service::{DataService, RemoteError, Rows};
