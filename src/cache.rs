//! The metadata cache.
//!
//! [`MetadataCache`] resolves class names and member descriptors into
//! foreign handles and memoizes them. Every resolution runs its check, native
//! lookup and insert under one [`CacheMutex`] critical section, so each key is
//! looked up at most once however many threads ask for it at the same time.
//! Failed lookups are never stored; the next caller simply tries again.
//!
//! Member ids are keyed by class identity, not by name: two class objects
//! called `com/example/Plugin` from different loaders get separate entries.
//!
//! ```rust,ignore
//! let cache = Arc::new(MetadataCache::new(accessor, None, LockMode::Recursive));
//! let string = cache.get_class(&ClassName::new("java/lang/String"), None)?;
//! let to_string = cache.method_id(&string, "toString", "()Ljava/lang/String;")?;
//! ```

use std::collections::hash_map::Entry;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::class::{ClassHandle, ClassName, FieldId, MemberDescriptor, MemberKind, MethodId};
use crate::env::{Env, EnvAccessor};
use crate::error::{BridgeError, Result};
use crate::loader::ClassLoader;
use crate::observer::Hook;
use crate::refs::{GlobalRef, LocalRef};
use crate::sync::{CacheGuard, CacheMutex, LockMode};
use crate::sys::jclass;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    /// [`ClassHandle::identity`] of a class owned by the cache
    class: usize,
    member: MemberDescriptor,
    is_static: bool,
}

#[derive(Default)]
struct CacheState {
    /// What `get_class` answers for a name.
    classes: FxHashMap<ClassName, ClassHandle>,
    /// Other class objects with an already cached name, met through `adopt_class`.
    shadowed: FxHashMap<ClassName, Vec<ClassHandle>>,
    methods: FxHashMap<MemberKey, MethodId>,
    fields: FxHashMap<MemberKey, FieldId>,
    /// Classes whose lookup is in progress on the thread holding the lock.
    resolving: FxHashSet<ClassName>,
}

impl CacheState {
    /// Every cached class object called `name`, the `get_class` answer first.
    fn candidates(&self, name: &ClassName) -> Vec<ClassHandle> {
        self.classes
            .get(name)
            .into_iter()
            .chain(self.shadowed.get(name).into_iter().flatten())
            .cloned()
            .collect()
    }

    fn owned_identity(&self, class: &ClassHandle) -> Option<usize> {
        let name = class.name();
        self.classes
            .get(name)
            .into_iter()
            .chain(self.shadowed.get(name).into_iter().flatten())
            .find(|owned| owned.ptr_eq(class))
            .map(ClassHandle::identity)
    }
}

/// A member id table inside [`CacheState`].
trait MemberId: Copy {
    fn table(state: &mut CacheState) -> &mut FxHashMap<MemberKey, Self>;

    fn lookup(env: Env<'_>, class: jclass, member: &MemberDescriptor, is_static: bool) -> Option<Self>;
}

impl MemberId for MethodId {
    fn table(state: &mut CacheState) -> &mut FxHashMap<MemberKey, Self> {
        &mut state.methods
    }

    fn lookup(env: Env<'_>, class: jclass, member: &MemberDescriptor, is_static: bool) -> Option<Self> {
        let raw = if is_static {
            env.get_static_method_id(class, member.name(), member.signature())
        } else {
            env.get_method_id(class, member.name(), member.signature())
        };
        raw.filter(|id| !id.is_null()).map(MethodId::new)
    }
}

impl MemberId for FieldId {
    fn table(state: &mut CacheState) -> &mut FxHashMap<MemberKey, Self> {
        &mut state.fields
    }

    fn lookup(env: Env<'_>, class: jclass, member: &MemberDescriptor, is_static: bool) -> Option<Self> {
        let raw = if is_static {
            env.get_static_field_id(class, member.name(), member.signature())
        } else {
            env.get_field_id(class, member.name(), member.signature())
        };
        raw.filter(|id| !id.is_null()).map(FieldId::new)
    }
}

/// Removes a class from the in-progress set when its lookup ends.
struct Resolving<'g, 'a> {
    guard: &'g CacheGuard<'a, CacheState>,
    name: &'g ClassName,
}

impl Drop for Resolving<'_, '_> {
    fn drop(&mut self) {
        self.guard.write(|state| state.resolving.remove(self.name));
    }
}

/// Resolve-once cache of classes and member ids.
///
/// Owns a global reference for every class it stores. Handles handed out are
/// clones of the stored one, so callers never release the cached reference;
/// it goes away when the cache itself is dropped.
pub struct MetadataCache {
    accessor: Arc<EnvAccessor>,
    default_loader: Option<Arc<dyn ClassLoader>>,
    state: CacheMutex<CacheState>,
}

impl MetadataCache {
    /// Creates an empty cache.
    ///
    /// `default_loader` is consulted when `FindClass` cannot see a class and
    /// the caller supplied no loader of their own.
    pub fn new(
        accessor: Arc<EnvAccessor>,
        default_loader: Option<Arc<dyn ClassLoader>>,
        mode: LockMode,
    ) -> Self {
        MetadataCache {
            accessor,
            default_loader,
            state: CacheMutex::new(mode, CacheState::default()),
        }
    }

    pub fn accessor(&self) -> &Arc<EnvAccessor> {
        &self.accessor
    }

    pub fn lock_mode(&self) -> LockMode {
        self.state.mode()
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Returns the cached class for `name`, looking it up on a miss.
    ///
    /// With a `loader` the lookup goes through that loader only. Without one
    /// it tries `FindClass` first and the default loader second.
    ///
    /// A class whose lookup re-enters `get_class` for the same name on the
    /// same thread fails with [`BridgeError::ClassNotFound`] instead of
    /// recursing forever.
    pub fn get_class(&self, name: &ClassName, loader: Option<&dyn ClassLoader>) -> Result<ClassHandle> {
        let guard = self.state.lock();
        if let Some(hit) = guard.read(|state| state.classes.get(name).cloned()) {
            tracing::trace!(class = %name, "class cache hit");
            return Ok(hit);
        }

        let observer = self.accessor.observer();
        let hook = Hook::Class(name);
        if !guard.write(|state| state.resolving.insert(name.clone())) {
            let err = BridgeError::ClassNotFound(name.clone());
            tracing::warn!(class = %name, "class lookup re-entered itself");
            observer.failure(&hook, &err);
            return Err(err);
        }
        let _resolving = Resolving { guard: &guard, name };

        observer.attempt(&hook);
        match self.lookup_class(name, loader) {
            Ok(handle) => {
                let stored = guard.write(|state| {
                    state
                        .classes
                        .entry(name.clone())
                        .or_insert_with(|| handle.clone())
                        .clone()
                });
                tracing::debug!(class = %name, "resolved class");
                observer.success(&hook);
                Ok(stored)
            }
            Err(err) => {
                tracing::debug!(class = %name, error = %err, "class lookup failed");
                observer.failure(&hook, &err);
                Err(err)
            }
        }
    }

    fn lookup_class(&self, name: &ClassName, loader: Option<&dyn ClassLoader>) -> Result<ClassHandle> {
        let env = self.accessor.current()?;
        let local = match loader {
            Some(loader) => loader.load_class(self, env, name),
            None => env
                .find_class(name.as_str())
                .filter(|class| !class.is_null())
                .or_else(|| {
                    let loader = self.default_loader.as_deref()?;
                    tracing::trace!(class = %name, "falling back to the default class loader");
                    loader.load_class(self, env, name)
                }),
        };
        let local = LocalRef::new(env, local.unwrap_or(std::ptr::null_mut()));
        if local.is_null() {
            return Err(BridgeError::ClassNotFound(name.clone()));
        }
        let global = GlobalRef::promote(env, local.get())?;
        Ok(ClassHandle::from_global(name.clone(), global))
    }

    /// Stores a class reference obtained some other way (reflection, a native
    /// method argument) under `name`.
    ///
    /// When a cached class called `name` is the same object as `class`, that
    /// handle is returned. Otherwise `class` is promoted to a global reference
    /// and stored: as the `get_class` answer if the name is new, or beside it
    /// if another loader's class already holds the name. `class` is never
    /// released here; its owner still has to.
    pub fn adopt_class(&self, name: &ClassName, env: Env<'_>, class: jclass) -> Result<ClassHandle> {
        let guard = self.state.lock();
        let candidates = guard.read(|state| state.candidates(name));
        if let Some(hit) = candidates
            .into_iter()
            .find(|cached| env.is_same_object(cached.as_raw(), class))
        {
            return Ok(hit);
        }

        let observer = self.accessor.observer();
        let hook = Hook::Class(name);
        observer.attempt(&hook);
        let handle = match GlobalRef::promote(env, class) {
            Ok(global) => ClassHandle::from_global(name.clone(), global),
            Err(err) => {
                observer.failure(&hook, &err);
                return Err(err);
            }
        };
        guard.write(|state| match state.classes.entry(name.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(class = %name, "adopted a second class object under a cached name");
                state.shadowed.entry(name.clone()).or_default().push(handle.clone());
            }
            Entry::Vacant(entry) => {
                tracing::debug!(class = %name, "adopted class");
                entry.insert(handle.clone());
            }
        });
        observer.success(&hook);
        Ok(handle)
    }

    pub fn contains_class(&self, name: &ClassName) -> bool {
        self.state.lock().read(|state| state.classes.contains_key(name))
    }

    /// Number of cached class objects, including same-name ones from other loaders.
    pub fn class_count(&self) -> usize {
        self.state
            .lock()
            .read(|state| state.classes.len() + state.shadowed.values().map(Vec::len).sum::<usize>())
    }

    /// Number of cached method and field ids.
    pub fn member_count(&self) -> usize {
        self.state
            .lock()
            .read(|state| state.methods.len() + state.fields.len())
    }

    // =========================================================================
    // Members
    // =========================================================================

    pub fn method_id(&self, class: &ClassHandle, name: &str, signature: &str) -> Result<MethodId> {
        self.resolve_member(class, name, signature, MemberKind::Method)
    }

    pub fn static_method_id(&self, class: &ClassHandle, name: &str, signature: &str) -> Result<MethodId> {
        self.resolve_member(class, name, signature, MemberKind::StaticMethod)
    }

    pub fn field_id(&self, class: &ClassHandle, name: &str, signature: &str) -> Result<FieldId> {
        self.resolve_member(class, name, signature, MemberKind::Field)
    }

    pub fn static_field_id(&self, class: &ClassHandle, name: &str, signature: &str) -> Result<FieldId> {
        self.resolve_member(class, name, signature, MemberKind::StaticField)
    }

    /// Identity of the cached class `class` stands for.
    ///
    /// Handles the cache gave out match by pointer. A handle wrapped
    /// elsewhere matches a cached class only if both refer to the same
    /// object; otherwise it has no identity and its members are not memoized.
    fn identity(&self, guard: &CacheGuard<'_, CacheState>, class: &ClassHandle) -> Option<usize> {
        if let Some(identity) = guard.read(|state| state.owned_identity(class)) {
            return Some(identity);
        }
        let candidates = guard.read(|state| state.candidates(class.name()));
        if candidates.is_empty() {
            return None;
        }
        let env = self.accessor.current().ok()?;
        candidates
            .iter()
            .find(|cached| env.is_same_object(cached.as_raw(), class.as_raw()))
            .map(ClassHandle::identity)
    }

    fn resolve_member<T: MemberId>(
        &self,
        class: &ClassHandle,
        name: &str,
        signature: &str,
        kind: MemberKind,
    ) -> Result<T> {
        let member = MemberDescriptor::new(name, signature);
        let guard = self.state.lock();
        let key = self.identity(&guard, class).map(|identity| MemberKey {
            class: identity,
            member: member.clone(),
            is_static: kind.is_static(),
        });
        if let Some(key) = &key {
            if let Some(id) = guard.write(|state| T::table(state).get(key).copied()) {
                tracing::trace!(class = %class.name(), %member, "member cache hit");
                return Ok(id);
            }
        }

        let observer = self.accessor.observer();
        let hook = Hook::Member {
            class: class.name(),
            member: &member,
            kind,
        };
        observer.attempt(&hook);
        let found = self.accessor.current().and_then(|env| {
            T::lookup(env, class.as_raw(), &member, kind.is_static()).ok_or_else(|| BridgeError::MemberNotFound {
                class: class.name().clone(),
                name: name.to_owned(),
                signature: signature.to_owned(),
                kind,
            })
        });
        match found {
            Ok(id) => {
                let id = match key {
                    Some(key) => guard.write(|state| *T::table(state).entry(key).or_insert(id)),
                    None => {
                        tracing::trace!(class = %class.name(), %member, "class is not cached, member id not memoized");
                        id
                    }
                };
                tracing::debug!(class = %class.name(), %member, %kind, "resolved member");
                observer.success(&hook);
                Ok(id)
            }
            Err(err) => {
                tracing::debug!(class = %class.name(), %member, error = %err, "member lookup failed");
                observer.failure(&hook, &err);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("accessor", &self.accessor)
            .field("classes", &self.class_count())
            .field("members", &self.member_count())
            .field("mode", &self.lock_mode())
            .finish()
    }
}
