//! Freshness-bounded synchronisation of remotely issued trust material
//!
//! Provides:
//! - One [`TrustDataManager`] per trust-material class (trust anchors,
//!   revocation lists, rule sets, value sets) with its own cache state
//! - A [`FreshnessPolicy`] deciding between serving, refreshing in the
//!   background, blocking, and rejecting data as too old
//! - A [`SingleFlight`] coordinator so concurrent callers share one fetch
//! - Pluggable remote-fetch ([`TrustDataClient`]) and persistence
//!   ([`TrustDataStore`]) seams with HTTP and file implementations
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trust_sync::{
//!     FileTrustDataStore, FreshnessPolicy, HttpTrustDataClient, RevocationList,
//!     TrustDataManager, TrustMaterial,
//! };
//!
//! # async fn run() -> trust_sync::TrustResult<()> {
//! let client = HttpTrustDataClient::new(
//!     "https://trust.example.org/api",
//!     RevocationList::KIND,
//!     RevocationList::KIND,
//!     std::time::Duration::from_secs(30),
//! )?;
//! let store = FileTrustDataStore::new("./trust-cache", RevocationList::KIND);
//! let revocations: TrustDataManager<RevocationList> = TrustDataManager::new(
//!     FreshnessPolicy::revocation_list(),
//!     Arc::new(client),
//!     Arc::new(store),
//! )?;
//!
//! if revocations.is_listed("URN:UVCI:01:DE:187/37512422923#Z").await? {
//!     println!("certificate revoked");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http_client;
pub mod manager;
pub mod material;
pub mod policy;
pub mod progress;
pub mod registry;
pub mod single_flight;
pub mod status;
pub mod store;

pub use client::{DownloadedData, TrustDataClient, VersionCheck};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::config::TrustSyncConfig;
pub use error::{TrustError, TrustResult};
pub use http_client::HttpTrustDataClient;
pub use manager::{TrustDataManager, TrustDataManagerBuilder};
pub use material::{
    hash_identifier, RevocationEntries, RevocationList, TrustAnchor, TrustAnchorList,
    TrustAnchors, TrustMaterial, ValueSetBundle, ValueSets,
};
pub use policy::{Freshness, FreshnessPolicy};
pub use progress::{DownloadProgress, NoopProgress, ProgressObserver, TracingProgress};
pub use registry::ManagerRegistry;
pub use single_flight::{FlightHandle, SingleFlight};
pub use status::SyncStatus;
pub use store::{FileTrustDataStore, InMemoryTrustDataStore, StoredSnapshot, TrustDataStore};
