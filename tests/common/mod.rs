//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use parking_lot::Mutex;
use registry_interest::prelude::*;
use registry_interest::model::Origin;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInstance {
    pub id: String,
    pub app: String,
}

impl TestInstance {
    pub fn new(id: &str, app: &str) -> Self {
        Self {
            id: id.to_string(),
            app: app.to_string(),
        }
    }
}

/// Remote session state of one fake channel generation.
#[derive(Default)]
pub struct Session {
    pub source: Option<Source>,
    pub changes: Mutex<Vec<Interest>>,
    pub closed: AtomicBool,
    /// Reject every interest update with `ChangeRejected`.
    pub reject: AtomicBool,
    /// Leave every interest update pending forever.
    pub stall: AtomicBool,
    pub stalled: AtomicBool,
    kill: CancellationToken,
}

impl Session {
    /// Simulate the remote session dying.
    pub fn fail(&self) {
        self.kill.cancel();
    }

    pub fn last_interest(&self) -> Option<Interest> {
        self.changes.lock().last().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeChannel(pub Arc<Session>);

#[async_trait]
impl Channel for FakeChannel {
    async fn closed(&self) -> Result<()> {
        self.0.kill.cancelled().await;
        Err(InterestError::ChannelFailure("session reset".into()))
    }

    async fn close(&self) {
        self.0.closed.store(true, Ordering::SeqCst);
    }

    fn source(&self) -> Option<Source> {
        self.0.source.clone()
    }
}

#[async_trait]
impl InterestChannel for FakeChannel {
    async fn change(&self, interest: Interest) -> Result<()> {
        if self.0.stall.load(Ordering::SeqCst) {
            self.0.stalled.store(true, Ordering::SeqCst);
            futures::future::pending::<()>().await;
        }
        if self.0.reject.load(Ordering::SeqCst) {
            return Err(InterestError::ChangeRejected(format!("server refused {interest}")));
        }
        self.0.changes.lock().push(interest);
        Ok(())
    }
}

/// Hands out fake channels and remembers every generation it created.
#[derive(Clone)]
pub struct FakeFactory {
    pub sessions: Arc<Mutex<Vec<Arc<Session>>>>,
    pub failures_left: Arc<AtomicU32>,
    rejecting_left: Arc<AtomicU32>,
    sourced: bool,
}

impl FakeFactory {
    pub fn sourced() -> Self {
        Self {
            sessions: Arc::default(),
            failures_left: Arc::default(),
            rejecting_left: Arc::default(),
            sourced: true,
        }
    }

    pub fn unsourced() -> Self {
        Self {
            sourced: false,
            ..Self::sourced()
        }
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Hand out `count` channels that reject every interest update.
    pub fn reject_sessions(&self, count: u32) {
        self.rejecting_left.store(count, Ordering::SeqCst);
    }

    pub fn session(&self, index: usize) -> Arc<Session> {
        Arc::clone(&self.sessions.lock()[index])
    }

    pub fn generations(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[async_trait]
impl ChannelFactory<FakeChannel> for FakeFactory {
    async fn create(&self) -> Result<FakeChannel> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(InterestError::ChannelCreation("connection refused".into()));
        }

        let source = self
            .sourced
            .then(|| Source::new(Origin::Interested, Some("registry-server")));
        let rejecting = self
            .rejecting_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let session = Arc::new(Session {
            source,
            reject: AtomicBool::new(rejecting),
            ..Session::default()
        });
        self.sessions.lock().push(Arc::clone(&session));
        Ok(FakeChannel(session))
    }
}

/// Minimal registry view keyed by instance id.
pub struct MemoryRegistry {
    entries: Mutex<HashMap<String, (TestInstance, Source)>>,
    events: Mutex<Option<broadcast::Sender<RegistryNotification<TestInstance>>>>,
    pub evictions: Mutex<Vec<Source>>,
    pub fail_evictions: AtomicBool,
    pub shutdowns: AtomicUsize,
    eviction_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryRegistry {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            events: Mutex::new(Some(events)),
            evictions: Mutex::new(Vec::new()),
            fail_evictions: AtomicBool::new(false),
            shutdowns: AtomicUsize::new(0),
            eviction_gate: Mutex::new(None),
        })
    }

    /// Store an instance as delivered by `source` and announce it.
    pub fn register(&self, instance: TestInstance, source: &Source) {
        let previous = self
            .entries
            .lock()
            .insert(instance.id.clone(), (instance.clone(), source.clone()));
        let notification = match previous {
            Some(_) => ChangeNotification::modify(instance),
            None => ChangeNotification::add(instance),
        };
        self.emit(notification.with_source(source.clone()));
    }

    /// Announce a change without a source tag.
    pub fn emit_plain(&self, notification: ChangeNotification<TestInstance>) {
        self.emit(notification.into());
    }

    /// Make the next eviction round finish only once `gate` is notified.
    pub fn hold_next_eviction(&self, gate: Arc<Notify>) {
        *self.eviction_gate.lock() = Some(gate);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn evictions(&self) -> Vec<Source> {
        self.evictions.lock().clone()
    }

    fn emit(&self, notification: RegistryNotification<TestInstance>) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(notification);
        }
    }
}

pub fn matches(interest: &Interest, instance: &TestInstance) -> bool {
    match interest {
        Interest::Empty => false,
        Interest::All => true,
        Interest::Application(app) => instance.app == *app,
        Interest::Vip(_) => false,
        Interest::Instance(id) => instance.id == *id,
        Interest::Union(members) => members.iter().any(|member| matches(member, instance)),
    }
}

#[async_trait]
impl RegistryView<TestInstance> for MemoryRegistry {
    fn for_interest(&self, interest: &Interest) -> BoxStream<'static, RegistryNotification<TestInstance>> {
        let entries = self.entries.lock();
        let receiver = self.events.lock().as_ref().map(|events| events.subscribe());

        let snapshot: Vec<_> = entries
            .values()
            .filter(|(instance, _)| matches(interest, instance))
            .map(|(instance, source)| ChangeNotification::add(instance.clone()).with_source(source.clone()))
            .collect();
        drop(entries);

        let interest = interest.clone();
        let live = stream::unfold(receiver, move |receiver| {
            let interest = interest.clone();
            async move {
                let mut receiver = receiver?;
                loop {
                    match receiver.recv().await {
                        Ok(notification) => {
                            if matches(&interest, notification.notification().data()) {
                                return Some((notification, Some(receiver)));
                            }
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        stream::iter(snapshot).chain(live).boxed()
    }

    async fn evict_all_except(&self, source: &Source) -> Result<u64> {
        self.evictions.lock().push(source.clone());
        if self.fail_evictions.load(Ordering::SeqCst) {
            return Err(InterestError::Eviction("index unavailable".into()));
        }

        let stale: Vec<(TestInstance, Source)> = {
            let mut entries = self.entries.lock();
            let ids: Vec<String> = entries
                .iter()
                .filter(|(_, (_, owner))| owner != source)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        for (instance, owner) in &stale {
            self.emit(ChangeNotification::delete(instance.clone()).with_source(owner.clone()));
        }

        let gate = self.eviction_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(stale.len() as u64)
    }

    async fn shutdown(&self) {
        self.events.lock().take();
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `check` until it holds, sleeping between attempts.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}
