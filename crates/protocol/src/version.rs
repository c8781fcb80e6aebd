//! Protocol versioning for daemon IPC communication.
//!
//! # Version History
//!
//! | Version | Changes |
//! |---------|---------|
//! | 1 | Initial protocol version |
//!
//! # Breaking Changes (require PROTOCOL_VERSION bump)
//!
//! - Removing fields from request/response types
//! - Changing field types
//! - Renaming fields or event tags without `#[serde(alias)]`
//! - Removing enum variants
//!
//! # Non-Breaking Changes (safe without version bump)
//!
//! - Adding new optional fields with `#[serde(default)]`
//! - Adding new request/response variants
//!
//! We keep `MIN_SUPPORTED_VERSION` one behind `PROTOCOL_VERSION` once a
//! second version exists, so an upgraded CLI can still talk to an old daemon.

/// Current protocol version. Bump when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Minimum protocol version this build can communicate with.
pub const MIN_SUPPORTED_VERSION: u32 = 1;
