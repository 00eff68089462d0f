//! Entities module - rows of the backend tables
//!
//! Each entity matches one table. The client never owns these: the in-memory
//! copies are caches refreshed from the backend.

pub mod confirmation;
pub mod enums;
pub mod gift;
pub mod timestamp;

// Re-exports
pub use confirmation::{AttendanceSummary, Confirmation};
pub use enums::{Attendance, Table};
pub use gift::{Gift, GiftStats};
