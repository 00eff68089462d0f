//! DTOs module - payloads sent to the backend and change notifications
//! received from it, kept apart from the entities they produce.

pub mod change_event;
pub mod confirmation;
pub mod gift;
pub mod query;

// Re-exports
pub use change_event::{ChangeEvent, ChangeKind, PhoenixMessage};
pub use confirmation::CreateConfirmationDTO;
pub use gift::{CreateGiftDTO, UpdateGiftDTO};
pub use query::{Filter, Order, SelectQuery};
