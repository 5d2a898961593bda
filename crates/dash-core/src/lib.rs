//! Core abstractions for stockdash
//!
//! This crate defines the interfaces through which the dashboard services talk
//! to their host: durable key/value storage, navigation between views, and
//! transient user-facing notices.

pub mod error;
pub mod navigation;
pub mod notice;
pub mod storage;

pub use error::{Error, Result};
pub use navigation::{Navigator, Route, RouteTracker};
pub use notice::{Notice, NoticeLevel, NoticeLog, NoticeSink, TracingNotices};
pub use storage::{FileStore, KeyValueStore, MemoryStore, keys};
