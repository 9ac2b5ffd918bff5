//! Interest filters and their union algebra.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A filter predicate over registered service instances.
///
/// Matching instances against an interest is the registry's job; this crate
/// only composes interests and forwards them. Values built through
/// [`Interest::union`] or [`Interest::union_all`] are kept in a normalized
/// form, so two unions over the same operands compare equal no matter the
/// order or multiplicity in which the operands were supplied.
///
/// # Examples
///
/// ```rust
/// use registry_interest::model::Interest;
///
/// let foo = Interest::application("foo");
/// let bar = Interest::application("bar");
///
/// assert_eq!(foo.union(&bar), bar.union(&foo));
/// assert_eq!(foo.union(&foo), foo);
/// assert_eq!(foo.union(&Interest::All), Interest::All);
/// assert_eq!(foo.union(&Interest::Empty), foo);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interest {
    /// Matches nothing. The union of no interests.
    #[default]
    Empty,
    /// Matches every instance.
    All,
    /// Matches instances of one application.
    Application(String),
    /// Matches instances advertising a VIP address.
    Vip(String),
    /// Matches a single instance by id.
    Instance(String),
    /// Matches anything one of the members matches.
    Union(BTreeSet<Interest>),
}

impl Interest {
    /// Interest in all instances of an application.
    pub fn application(name: impl Into<String>) -> Self {
        Self::Application(name.into())
    }

    /// Interest in all instances behind a VIP address.
    pub fn vip(address: impl Into<String>) -> Self {
        Self::Vip(address.into())
    }

    /// Interest in one instance.
    pub fn instance(id: impl Into<String>) -> Self {
        Self::Instance(id.into())
    }

    /// Interest in any of the given instance ids.
    pub fn instances<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self::union_all(ids.into_iter().map(Self::instance))
    }

    /// Returns true when this interest can match nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Logical OR of two interests.
    pub fn union(&self, other: &Interest) -> Interest {
        Self::union_all([self.clone(), other.clone()])
    }

    /// Logical OR of any number of interests.
    ///
    /// `Empty` operands are dropped, `All` absorbs everything, nested unions
    /// are flattened and a union with a single member collapses to it.
    pub fn union_all(interests: impl IntoIterator<Item = Interest>) -> Interest {
        let mut members = BTreeSet::new();
        for interest in interests {
            if interest.flatten_into(&mut members) {
                return Interest::All;
            }
        }

        match members.len() {
            0 => Interest::Empty,
            1 => members.pop_first().unwrap_or(Interest::Empty),
            _ => Interest::Union(members),
        }
    }

    /// Members of this interest as seen by a union. Atomic interests yield
    /// themselves.
    pub fn members(&self) -> Vec<&Interest> {
        match self {
            Self::Empty => Vec::new(),
            Self::Union(members) => members.iter().collect(),
            other => vec![other],
        }
    }

    // Returns true when `All` was reached.
    fn flatten_into(self, members: &mut BTreeSet<Interest>) -> bool {
        match self {
            Interest::Empty => false,
            Interest::All => true,
            Interest::Union(inner) => inner.into_iter().any(|i| i.flatten_into(members)),
            atomic => {
                members.insert(atomic);
                false
            }
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "none"),
            Self::All => write!(f, "all"),
            Self::Application(name) => write!(f, "app={}", name),
            Self::Vip(address) => write!(f, "vip={}", address),
            Self::Instance(id) => write!(f, "id={}", id),
            Self::Union(members) => {
                write!(f, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, ")")
            }
        }
    }
}
