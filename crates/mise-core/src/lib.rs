//! # Mise Core Library
//!
//! Core logic for mise, a kitchen companion that keeps recipe pages of
//! countdown timers and unit converters in sync with a remote store. The
//! `mise` CLI is a thin front end over this crate.
//!
//! ## Architecture
//!
//! - **Conversion**: built-in unit categories and bidirectional converters
//!   whose two fields drive each other
//! - **Timer**: a pure countdown state machine plus per-timer tick scheduling
//!   with synchronous cancellation
//! - **Store**: the page store trait, a REST client and an in-memory store
//! - **Session**: one open page, reconciled with the store after every change
//! - **Storage**: TOML configuration in the data directory
//!
//! ## Key Components
//!
//! - [`PageSession`]: orchestrates one page
//! - [`TimerState`]: countdown state machine
//! - [`ConverterInstance`]: two-field converter
//! - [`PageStore`]: backend abstraction
//! - [`Config`]: application configuration

pub mod conversion;
pub mod error;
pub mod events;
pub mod ids;
pub mod notify;
pub mod session;
pub mod storage;
pub mod store;
pub mod timer;

pub use conversion::{Category, ConversionRegistry, ConverterCollection, ConverterInstance, Side};
pub use error::{ConfigError, ConverterError, CoreError, SessionError, StoreError, TimerError};
pub use events::Event;
pub use ids::EntityId;
pub use notify::{ChannelNotifier, CompletionNotifier, LogNotifier};
pub use session::{AuthSession, PageSession, PageView, SessionStatus};
pub use storage::{data_dir, Config};
pub use store::{HttpStore, InMemoryStore, PageStore};
pub use timer::{ManualScheduler, TickScheduler, TimerCollection, TimerSnapshot, TimerState, TimerStatus, TokioScheduler};
