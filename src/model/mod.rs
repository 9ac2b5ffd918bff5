//! Data model shared by the handler and its external collaborators.

mod interest;
mod notification;
mod source;

pub use interest::Interest;
pub use notification::{ChangeKind, ChangeNotification, RegistryNotification, translate};
pub use source::{Origin, Source};
