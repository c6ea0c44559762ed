//! Explicitly owned registrations on the global event streams.
//!
//! Nothing is registered ambiently: each controller keeps the handles it
//! added in a [`ListenerSet`] and releases them all in one call. Dispatch
//! works on a snapshot and re-checks membership before every delivery, so a
//! listener removed while a stream is being delivered (including removing
//! itself) is simply skipped.

use std::collections::BTreeMap;

/// Global event streams a controller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventStream {
    Click,
    PointerMove,
    PointerUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Identity of whoever registered a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    stream: EventStream,
    owner: OwnerId,
}

#[derive(Debug, Default)]
pub struct ListenerRegistry {
    entries: BTreeMap<ListenerId, Registration>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stream: EventStream, owner: OwnerId) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.insert(id, Registration { stream, owner });
        id
    }

    /// Returns false when the handle was not (or no longer) registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Listeners on `stream` in registration order.
    pub fn snapshot(&self, stream: EventStream) -> Vec<(ListenerId, OwnerId)> {
        self.entries
            .iter()
            .filter(|(_, r)| r.stream == stream)
            .map(|(id, r)| (*id, r.owner))
            .collect()
    }

    pub fn count_for(&self, owner: OwnerId) -> usize {
        self.entries.values().filter(|r| r.owner == owner).count()
    }

    pub fn count_on(&self, stream: EventStream) -> usize {
        self.entries.values().filter(|r| r.stream == stream).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver to every listener on `stream`, tolerating removals made by
    /// `deliver` itself. `deliver` receives the registry back so a callback
    /// can tear down its own registrations.
    pub fn dispatch<F>(&mut self, stream: EventStream, mut deliver: F)
    where
        F: FnMut(&mut ListenerRegistry, ListenerId, OwnerId),
    {
        for (id, owner) in self.snapshot(stream) {
            if !self.contains(id) {
                continue;
            }
            deliver(self, id, owner);
        }
    }
}

/// The handles one controller registered.
#[derive(Debug, Default)]
pub struct ListenerSet {
    handles: Vec<ListenerId>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(
        &mut self,
        registry: &mut ListenerRegistry,
        stream: EventStream,
        owner: OwnerId,
    ) -> ListenerId {
        let id = registry.add(stream, owner);
        self.handles.push(id);
        id
    }

    pub fn owns(&self, id: ListenerId) -> bool {
        self.handles.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Release every handle. Returns how many were still registered.
    pub fn release_all(&mut self, registry: &mut ListenerRegistry) -> usize {
        self.handles
            .drain(..)
            .filter(|id| registry.remove(*id))
            .count()
    }
}
