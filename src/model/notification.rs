//! Change notifications and the sourced-to-plain translation.

use super::Source;
use serde::{Deserialize, Serialize};

/// Kind of change carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Instance became visible.
    Add,
    /// Instance data changed.
    Modify,
    /// Instance went away.
    Delete,
}

/// A change to one instance, as handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification<I> {
    kind: ChangeKind,
    data: I,
}

impl<I> ChangeNotification<I> {
    /// Create a notification of the given kind.
    pub fn new(kind: ChangeKind, data: I) -> Self {
        Self { kind, data }
    }

    /// An `Add` notification.
    pub fn add(data: I) -> Self {
        Self::new(ChangeKind::Add, data)
    }

    /// A `Modify` notification.
    pub fn modify(data: I) -> Self {
        Self::new(ChangeKind::Modify, data)
    }

    /// A `Delete` notification.
    pub fn delete(data: I) -> Self {
        Self::new(ChangeKind::Delete, data)
    }

    /// Kind of change.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// The instance this change is about.
    pub fn data(&self) -> &I {
        &self.data
    }

    /// Consume the notification, returning the instance.
    pub fn into_data(self) -> I {
        self.data
    }

    /// Tag this notification with the source that produced it.
    pub fn with_source(self, source: Source) -> RegistryNotification<I> {
        RegistryNotification::Sourced {
            notification: self,
            source,
        }
    }
}

/// A notification as emitted by a registry view.
///
/// Registry views may tag changes with the [`Source`] of the connection
/// that produced them. Subscribers never see the tag; see [`translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryNotification<I> {
    /// A change with no source attached.
    Change(ChangeNotification<I>),
    /// A change attributed to a connection generation.
    Sourced {
        /// The change itself
        notification: ChangeNotification<I>,
        /// Generation that produced it
        source: Source,
    },
}

impl<I> RegistryNotification<I> {
    /// The source tag, if any.
    pub fn source(&self) -> Option<&Source> {
        match self {
            Self::Change(_) => None,
            Self::Sourced { source, .. } => Some(source),
        }
    }

    /// The change, regardless of tagging.
    pub fn notification(&self) -> &ChangeNotification<I> {
        match self {
            Self::Change(notification) | Self::Sourced { notification, .. } => notification,
        }
    }

    /// Strip the source tag.
    pub fn into_base(self) -> ChangeNotification<I> {
        match self {
            Self::Change(notification) => notification,
            Self::Sourced { notification, .. } => notification,
        }
    }
}

impl<I> From<ChangeNotification<I>> for RegistryNotification<I> {
    fn from(notification: ChangeNotification<I>) -> Self {
        Self::Change(notification)
    }
}

/// Convert a registry notification into the plain form exposed to callers.
///
/// Sourced notifications keep their kind and instance and lose the source;
/// plain notifications pass through unchanged.
pub fn translate<I>(notification: RegistryNotification<I>) -> ChangeNotification<I> {
    notification.into_base()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Origin;

    #[test]
    fn test_sourced_translation_keeps_kind_and_data() {
        let source = Source::with_id(Origin::Interested, Some("peer"), 1);
        for kind in [ChangeKind::Add, ChangeKind::Modify, ChangeKind::Delete] {
            let sourced = ChangeNotification::new(kind, "i-1").with_source(source.clone());
            assert_eq!(sourced.source(), Some(&source));

            let plain = translate(sourced);
            assert_eq!(plain.kind(), kind);
            assert_eq!(*plain.data(), "i-1");
        }
    }

    #[test]
    fn test_plain_translation_is_identity() {
        for plain in [
            ChangeNotification::add(1),
            ChangeNotification::modify(2),
            ChangeNotification::delete(3),
        ] {
            let wrapped = RegistryNotification::from(plain.clone());
            assert!(wrapped.source().is_none());
            assert_eq!(translate(wrapped), plain);
        }
    }

    #[test]
    fn test_notification_accessor() {
        let source = Source::with_id(Origin::Replicated, None::<String>, 9);
        let sourced = ChangeNotification::modify("i-9").with_source(source);
        assert_eq!(sourced.notification().kind(), ChangeKind::Modify);
        assert_eq!(sourced.into_base().into_data(), "i-9");
    }
}
