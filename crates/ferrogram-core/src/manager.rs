//! Typed factory and cache for one entity kind.
//!
//! An [`EntityManager`] turns payloads into [`Handle`]s. The first sighting of
//! a key builds a new entity; every later sighting patches that same instance,
//! so handles given out earlier observe the update.
//!
//! ```rust
//! use ferrogram_core::{Capacity, EntityManager, User, UserPayload};
//!
//! let users = EntityManager::<User>::new(Capacity::Bounded(100));
//!
//! let first = users.upsert(&UserPayload::with_id(9), None).unwrap();
//! let second = users
//!     .upsert(
//!         &UserPayload {
//!             username: Some("ada".into()),
//!             ..UserPayload::with_id(9)
//!         },
//!         None,
//!     )
//!     .unwrap();
//!
//! assert!(first.ptr_eq(&second));
//! assert_eq!(first.read().username.as_deref(), Some("ada"));
//! ```
//!
//! # Locking
//!
//! Each manager serializes cache lookups, inserts and removals behind one
//! mutex. Patches run under the entity's write lock only, after the manager
//! lock is released, so two racing upserts of the same key still cannot lose
//! an update and readers never observe a partially patched entity. Code
//! holding a [`Handle::read`] guard may call back into any manager.

use std::fmt;

use parking_lot::Mutex;
use tracing::trace;

use crate::cache::{BoundedCache, Capacity};
use crate::entity::{Entity, Handle};
use crate::error::{CoreError, CoreResult};

/// Something an [`EntityManager`] can resolve to a handle.
pub enum Resolvable<T: Entity> {
    /// Already an instance; resolved unchanged.
    Handle(Handle<T>),
    /// A key to look up in the cache.
    Id(T::Id),
}

impl<T: Entity> From<Handle<T>> for Resolvable<T> {
    fn from(handle: Handle<T>) -> Self {
        Self::Handle(handle)
    }
}

impl<T: Entity> From<&Handle<T>> for Resolvable<T> {
    fn from(handle: &Handle<T>) -> Self {
        Self::Handle(handle.clone())
    }
}

/// Factory and bounded cache for one entity kind.
pub struct EntityManager<T: Entity> {
    cache: Mutex<BoundedCache<T::Id, Handle<T>>>,
}

impl<T: Entity> EntityManager<T> {
    /// Creates an empty manager holding at most `capacity` entities.
    pub fn new(capacity: Capacity) -> Self {
        Self {
            cache: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    /// Inserts or patches the entity carried by `payload`.
    ///
    /// The key is `id_override` when given, otherwise the payload's own
    /// identity. Fails with [`CoreError::MalformedPayload`] when neither is
    /// available; nothing is inserted in that case.
    pub fn upsert(&self, payload: &T::Payload, id_override: Option<T::Id>) -> CoreResult<Handle<T>> {
        self.upsert_inner(payload, id_override, false)
            .map(|(handle, _)| handle)
    }

    /// Like [`upsert`](Self::upsert), and also returns the entity's state from
    /// before the patch, or `None` if this was the first sighting.
    pub fn upsert_with_previous(
        &self,
        payload: &T::Payload,
        id_override: Option<T::Id>,
    ) -> CoreResult<(Handle<T>, Option<T>)> {
        self.upsert_inner(payload, id_override, true)
    }

    fn upsert_inner(
        &self,
        payload: &T::Payload,
        id_override: Option<T::Id>,
        keep_previous: bool,
    ) -> CoreResult<(Handle<T>, Option<T>)> {
        let id = id_override
            .or_else(|| T::identify(payload))
            .ok_or_else(|| CoreError::malformed(T::KIND, "missing identity field"))?;

        let mut cache = self.cache.lock();

        if let Some(handle) = cache.get(&id).cloned() {
            drop(cache);
            let previous = {
                let mut entity = handle.write();
                let previous = keep_previous.then(|| entity.clone());
                entity.apply_patch(payload);
                previous
            };
            return Ok((handle, previous));
        }

        let handle = Handle::new(T::from_payload(id.clone(), payload));
        if let Some((evicted, _)) = cache.set(id, handle.clone()) {
            trace!(kind = %T::KIND, key = ?evicted, "Evicted oldest cached entity");
        }
        Ok((handle, None))
    }

    /// Resolves an instance or a key to a cached handle. Never fetches.
    pub fn resolve(&self, target: impl Into<Resolvable<T>>) -> Option<Handle<T>> {
        match target.into() {
            Resolvable::Handle(handle) => Some(handle),
            Resolvable::Id(id) => self.get(&id),
        }
    }

    /// Looks up a cached entity by key.
    pub fn get(&self, id: &T::Id) -> Option<Handle<T>> {
        self.cache.lock().get(id).cloned()
    }

    /// Removes an entity, returning whether it was cached.
    ///
    /// Outstanding handles stay valid but are no longer patched.
    pub fn remove(&self, id: &T::Id) -> bool {
        self.cache.lock().delete(id)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.cache.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        self.cache.lock().capacity()
    }

    /// Changes the capacity, evicting the oldest entities if needed.
    pub fn set_capacity(&self, capacity: Capacity) {
        let evicted = self.cache.lock().set_capacity(capacity);
        if !evicted.is_empty() {
            trace!(kind = %T::KIND, count = evicted.len(), "Evicted entities after resize");
        }
    }

    /// Returns the cached keys, oldest first.
    pub fn keys(&self) -> Vec<T::Id> {
        self.cache.lock().keys().cloned().collect()
    }

    /// Removes every cached entity.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl<T: Entity> Default for EntityManager<T> {
    fn default() -> Self {
        Self::new(Capacity::Unbounded)
    }
}

impl<T: Entity> fmt::Debug for EntityManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("EntityManager")
            .field("kind", &T::KIND)
            .field("len", &cache.len())
            .field("capacity", &cache.capacity())
            .finish()
    }
}
