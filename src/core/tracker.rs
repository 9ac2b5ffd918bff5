//! Reference-counted set of live interests and their union.

use crate::model::Interest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Tracks every live registration and publishes the union of their interests.
///
/// Registrations are counted: appending the same interest twice requires two
/// removals before it leaves the union. The union is published through a
/// `watch` channel, so a new observer sees the current value immediately and
/// then every change. Unchanged unions are not re-published.
///
/// # Examples
///
/// ```rust
/// use registry_interest::core::InterestTracker;
/// use registry_interest::model::Interest;
///
/// let tracker = InterestTracker::new();
/// let foo = Interest::application("foo");
///
/// tracker.append_interest(foo.clone());
/// tracker.append_interest(foo.clone());
/// tracker.remove_interest(&foo);
/// assert_eq!(tracker.current_union(), foo);
///
/// tracker.remove_interest(&foo);
/// assert_eq!(tracker.current_union(), Interest::Empty);
/// ```
pub struct InterestTracker {
    registrations: Mutex<HashMap<Interest, usize>>,
    union: watch::Sender<Interest>,
}

impl InterestTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        let (union, _) = watch::channel(Interest::Empty);
        Self {
            registrations: Mutex::new(HashMap::new()),
            union,
        }
    }

    /// Add one registration for `interest`.
    pub fn append_interest(&self, interest: Interest) {
        let mut registrations = self.registrations.lock();
        *registrations.entry(interest).or_insert(0) += 1;
        self.publish(&registrations);
    }

    /// Remove one registration for `interest`.
    ///
    /// Returns false if no registration for it was live, in which case
    /// nothing changes.
    pub fn remove_interest(&self, interest: &Interest) -> bool {
        let mut registrations = self.registrations.lock();
        let Some(count) = registrations.get_mut(interest) else {
            return false;
        };

        *count -= 1;
        if *count == 0 {
            registrations.remove(interest);
        }
        self.publish(&registrations);
        true
    }

    /// The union over all live registrations.
    pub fn current_union(&self) -> Interest {
        self.union.borrow().clone()
    }

    /// Number of live registrations, counting duplicates.
    pub fn registration_count(&self) -> usize {
        self.registrations.lock().values().sum()
    }

    /// Number of live registrations for one interest value.
    pub fn count_of(&self, interest: &Interest) -> usize {
        self.registrations
            .lock()
            .get(interest)
            .copied()
            .unwrap_or(0)
    }

    /// Stream of union values, starting with the current one.
    pub fn interest_changes(&self) -> watch::Receiver<Interest> {
        self.union.subscribe()
    }

    // Called with the registration lock held so publications follow mutation order.
    fn publish(&self, registrations: &HashMap<Interest, usize>) {
        let next = Interest::union_all(registrations.keys().cloned());
        self.union.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(union = %next, "interest union changed");
            *current = next;
            true
        });
    }
}

impl Default for InterestTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration. Dropping it removes exactly one occurrence of its
/// interest from the tracker.
pub(crate) struct Registration {
    tracker: Arc<InterestTracker>,
    interest: Interest,
}

impl Registration {
    pub(crate) fn new(tracker: Arc<InterestTracker>, interest: Interest) -> Self {
        tracker.append_interest(interest.clone());
        Self { tracker, interest }
    }

    pub(crate) fn interest(&self) -> &Interest {
        &self.interest
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.tracker.remove_interest(&self.interest);
    }
}
