//! # cachestore core
//!
//! Key-value cache stores for serializable values.
//!
//! This crate provides:
//! - The [`Store`] contract: save, read, timestamp, delete, observe, clear
//! - [`DurableStore`]: values persisted in a journaled [`Engine`], with
//!   observers driven by the engine's commit feed
//! - [`EphemeralStore`]: values in a flat preference map, observers notified
//!   inline
//! - [`StoreFactory`] for building either variant
//!
//! ## Designated thread
//!
//! The engine's mutation context may only be touched from one thread, which
//! the engine owns. [`Engine::perform`] runs a closure there and blocks the
//! caller until it returns, so durable stores can be called from any thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cachestore_core::{Store, StoreFactory};
//!
//! let cache = StoreFactory::cache_store_in_memory()?;
//! cache.start_observing_updates("name", || println!("name changed"));
//!
//! cache.save("abc", "name")?;
//! let name: Option<String> = cache.data("name")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod dir;
mod durable;
mod engine;
mod ephemeral;
mod error;
mod executor;
mod factory;
pub mod journal;
mod observer;
mod record;
mod store;
mod types;

pub use change_feed::{ChangeFeed, ChangeType, CommitEvent, SubscriptionId};
pub use config::{Config, StoreConfig};
pub use dir::CacheDir;
pub use durable::DurableStore;
pub use engine::{Engine, EngineStats, MutationContext};
pub use ephemeral::EphemeralStore;
pub use error::{CoreError, CoreResult};
pub use executor::Executor;
pub use factory::{AnyStore, StoreFactory, StoreKind};
pub use observer::{ObserverCallback, ObserverRegistry};
pub use record::{Record, RecordKey};
pub use store::Store;
pub use types::{SequenceNumber, Timestamp, TransactionId};

pub use cachestore_codec::{CborCodec, Codec, CodecError, JsonCodec};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
