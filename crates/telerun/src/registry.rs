//! # Identity Registry
//!
//! The bidirectional map between object IDs and values. IDs this peer
//! allocated index local handles; IDs learned from the peer index the
//! proxies materialized for them. Local entries are strong while the
//! peer holds a stub and demote to weak on release, so a later
//! re-export restores identity if the value is still alive.
//!
//! ## Invariants
//!
//! - Exactly one entry per exposed local ID for the lifetime of the
//!   peer's interest in it.
//! - At most one live proxy per remote ID.
//! - IDs are never reused within a session.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;

use telewire::Fault;
use telewire::FaultKind;
use telewire::ObjectId;

use crate::object::Callable;
use crate::object::HostObject;
use crate::object::Value;
use crate::stub::RemoteFunction;
use crate::stub::Stub;

/// A strong handle to a local value exposed under an ID.
#[derive(Clone)]
pub(crate) enum LocalHandle {
    Object(Arc<dyn HostObject>),
    Function(Arc<dyn Callable>),
}

impl std::fmt::Debug for LocalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object(_) => f.debug_tuple("Object").finish(),
            Self::Function(_) => f.debug_tuple("Function").finish(),
        }
    }
}

impl LocalHandle {
    /// Allocation address, the identity key. Stable while any strong or
    /// weak reference pins the allocation.
    fn identity(&self) -> usize {
        match self {
            Self::Object(object) => Arc::as_ptr(object) as *const () as usize,
            Self::Function(callable) => Arc::as_ptr(callable) as *const () as usize,
        }
    }

    fn downgrade(&self) -> WeakLocal {
        match self {
            Self::Object(object) => WeakLocal::Object(Arc::downgrade(object)),
            Self::Function(callable) => WeakLocal::Function(Arc::downgrade(callable)),
        }
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Self::Object(object) => Value::Object(object),
            Self::Function(callable) => Value::Function(callable),
        }
    }
}

enum WeakLocal {
    Object(Weak<dyn HostObject>),
    Function(Weak<dyn Callable>),
}

impl WeakLocal {
    fn identity(&self) -> usize {
        match self {
            Self::Object(object) => Weak::as_ptr(object) as *const () as usize,
            Self::Function(callable) => Weak::as_ptr(callable) as *const () as usize,
        }
    }

    fn upgrade(&self) -> Option<LocalHandle> {
        match self {
            Self::Object(object) => object.upgrade().map(LocalHandle::Object),
            Self::Function(callable) => callable.upgrade().map(LocalHandle::Function),
        }
    }
}

/// One local entry: strong while the peer holds a stub, weak after the
/// peer released it.
enum LocalEntry {
    Strong(LocalHandle),
    Weak(WeakLocal),
}

/// A weak handle to a proxy materialized for a peer-owned ID.
pub(crate) enum RemoteHandle {
    Stub(Weak<Stub>),
    Function(Weak<RemoteFunction>),
}

impl RemoteHandle {
    fn is_alive(&self) -> bool {
        match self {
            Self::Stub(stub) => stub.strong_count() > 0,
            Self::Function(callable) => callable.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<Value> {
        match self {
            Self::Stub(stub) => stub.upgrade().map(Value::Stub),
            Self::Function(callable) => {
                let callable: Arc<dyn Callable> = callable.upgrade()?;
                Some(Value::Function(callable))
            }
        }
    }
}

pub(crate) struct Registry {
    local_by_id: DashMap<ObjectId, LocalEntry>,
    /// Identity address → ID, validated against the entry on every hit
    /// so a reused allocation address can never resurrect a dead ID.
    local_ids: DashMap<usize, ObjectId>,
    remote_by_id: DashMap<ObjectId, RemoteHandle>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            local_by_id: DashMap::new(),
            local_ids: DashMap::new(),
            remote_by_id: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> ObjectId {
        ObjectId::new(self.next_id.fetch_add(1, Ordering::Relaxed).to_string())
    }

    /// Returns the wire ID for a local handle, allocating on first
    /// exposure. `introduced` is true when the peer owes this ID a full
    /// description: a fresh entry, or a demoted entry re-promoted after
    /// the peer released its stub.
    pub(crate) fn expose(&self, handle: LocalHandle) -> (ObjectId, bool) {
        let key = handle.identity();

        if let Some(known) = self.local_ids.get(&key).map(|entry| entry.value().clone()) {
            let mut stale = false;
            if let Some(mut entry) = self.local_by_id.get_mut(&known) {
                match &*entry {
                    LocalEntry::Strong(_) => return (known, false),
                    LocalEntry::Weak(weak) => {
                        if weak.upgrade().is_some() {
                            *entry = LocalEntry::Strong(handle);
                            return (known, true);
                        }
                        // dead weak entry: the address was reused by a new
                        // allocation, so the old ID is retired
                        stale = true;
                    }
                }
            }
            if stale {
                self.local_by_id.remove(&known);
            }
            self.local_ids.remove(&key);
        }

        let id = self.allocate_id();
        self.local_by_id.insert(id.clone(), LocalEntry::Strong(handle));
        self.local_ids.insert(key, id.clone());
        (id, true)
    }

    /// Resolves an ID the peer claims this side owns, re-promoting a
    /// live demoted entry back to strong.
    pub(crate) fn local(&self, id: &ObjectId) -> Result<LocalHandle, Fault> {
        let missing = || {
            Fault::new(
                FaultKind::UnknownLocal,
                format!("no local object under id '{}'", id),
            )
        };

        let mut dead = false;
        if let Some(mut entry) = self.local_by_id.get_mut(id) {
            match &*entry {
                LocalEntry::Strong(handle) => return Ok(handle.clone()),
                LocalEntry::Weak(weak) => match weak.upgrade() {
                    Some(handle) => {
                        *entry = LocalEntry::Strong(handle.clone());
                        return Ok(handle);
                    }
                    None => dead = true,
                },
            }
        }
        if dead {
            self.purge_local(id);
        }
        Err(missing())
    }

    /// Erase a dead entry and its identity index slot.
    fn purge_local(&self, id: &ObjectId) {
        if let Some((_, LocalEntry::Weak(weak))) =
            self.local_by_id.remove_if(id, |_, entry| {
                matches!(entry, LocalEntry::Weak(weak) if weak.upgrade().is_none())
            })
        {
            self.local_ids
                .remove_if(&weak.identity(), |_, known| known == id);
        }
    }

    /// Inbound `del`: the peer dropped its stub. The entry demotes to a
    /// weak reference; a no-op if already weak or unknown.
    pub(crate) fn release_local(&self, id: &ObjectId) {
        if let Some(mut entry) = self.local_by_id.get_mut(id) {
            if let LocalEntry::Strong(handle) = &*entry {
                *entry = LocalEntry::Weak(handle.downgrade());
            }
        }
    }

    /// The live proxy for a peer-owned ID, if one exists.
    pub(crate) fn remote(&self, id: &ObjectId) -> Option<Value> {
        self.remote_by_id.get(id).and_then(|entry| entry.upgrade())
    }

    /// Installs the proxy for a peer-owned ID. A live proxy already
    /// holding the slot is a peer bug.
    pub(crate) fn register_remote(&self, id: ObjectId, handle: RemoteHandle) -> Result<(), Fault> {
        match self.remote_by_id.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().is_alive() {
                    return Err(Fault::new(
                        FaultKind::DuplicateRemote,
                        format!("a live stub already exists for id '{}'", occupied.key()),
                    ));
                }
                occupied.insert(handle);
                Ok(())
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(handle);
                Ok(())
            }
        }
    }

    /// GC bridge: a proxy was dropped. Erases the slot unless a newer
    /// proxy has already taken it; returns whether a release is owed.
    pub(crate) fn forget_remote(&self, id: &ObjectId) -> bool {
        self.remote_by_id
            .remove_if(id, |_, entry| !entry.is_alive())
            .is_some()
    }
}
