//! Database models.

pub mod content_type;
pub mod entry;
pub mod entry_status;
pub mod revision;
pub mod role;
pub mod user;

pub use content_type::{ContentType, FieldDefinition};
pub use entry::{Entry, EntryAttributes};
pub use entry_status::EntryStatus;
pub use revision::{NewRevision, Revision};
pub use role::Role;
pub use user::User;
