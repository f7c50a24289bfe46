//! Intrinsics implementation modules
//!
//! ## Current modules:
//! - `promise` - Promise constructor, statics and prototype methods (ES2026)

pub mod promise;
