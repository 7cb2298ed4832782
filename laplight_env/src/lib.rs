//! LapLight Environment Abstraction Layer
//!
//! This crate isolates everything the tracking core needs from the outside
//! world behind traits, so the same core runs on a real host (tokio, HTTP,
//! SNTP) and inside the deterministic simulator:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Task spawning
//! - Roster, location and network-time collaborators
//!
//! # Example
//!
//! ```ignore
//! use laplight_env::{HttpFeed, LocationSource, RaceContext, TokioContext};
//!
//! async fn poll<Ctx: RaceContext, L: LocationSource>(ctx: &Ctx, feed: &L) {
//!     loop {
//!         match feed.fetch_locations().await {
//!             Ok(batch) => handle(batch),
//!             Err(e) => tracing::warn!("skipping cycle: {}", e),
//!         }
//!         ctx.sleep(Duration::from_secs(1)).await;
//!     }
//! }
//! ```

mod context;
mod error;
mod feeds;
mod http;
mod sntp;
mod tokio_impl;
mod types;

pub use context::RaceContext;
pub use error::EnvError;
pub use feeds::{LocationSource, RosterSource, TimeAuthority};
pub use http::{HttpFeed, HttpUrl, DEFAULT_FETCH_TIMEOUT};
pub use sntp::{SntpClient, DEFAULT_NTP_SERVER};
pub use tokio_impl::TokioContext;
pub use types::{DriverNumber, LocationBatch, LocationDto, RosterEntry, Rgb};
