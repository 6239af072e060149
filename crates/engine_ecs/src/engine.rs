//! The [`Engine`]: entity population, family matching, and the update pass.
//!
//! ## Matching
//!
//! For every family the engine has been asked about, it keeps a
//! [`MatchingSet`]. Each component mutation re-tests the entity against every
//! registered family (a constant number of word operations per family), so the
//! cost of a mutation is `O(#families)`, never `O(#entities)`. Each entity
//! caches which families it belongs to, so only real transitions touch a set
//! or fire a listener.
//!
//! ## Deferral
//!
//! Structural operations (entity add/remove, component add/remove, system
//! add/remove, listener add/remove) issued while the engine is busy are queued:
//!
//! - during an update pass, they are applied in issue order right after the
//!   issuing system's `update` returns, before the next system runs;
//! - during a listener notification or a system attach/detach hook, they are
//!   applied once the operation that triggered the callback has finished.
//!
//! A system's pass therefore never observes a matching set changing under it.
//! Entities added mid-frame are appended to the end of their matching sets
//! and are first visited by systems that run after the flush.
//!
//! Reads (`entity`, `get_component`, `entities_for`, ...) always reflect the
//! state as applied so far, not queued operations.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_component::{
    Component, ComponentBits, ComponentSet, ComponentType, Family, FamilyKey, Registry,
};
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::entity::{Entity, EntityId};
use crate::error::EngineError;
use crate::listener::{EntityListener, ListenerEntry, ListenerId, ListenerTable};
use crate::matching::MatchingSet;
use crate::pending::{PendingOperation, PendingQueue};
use crate::system::{System, SystemEntry, SystemTable};

/// Owns entities, matching sets, listeners and systems, and drives the
/// per-frame update pass.
///
/// The engine is single-threaded: `update` runs to completion before any other
/// operation can execute, and there is no suspension point inside a frame.
pub struct Engine {
    registry: Arc<Registry>,
    config: EngineConfig,
    next_entity_id: u64,
    entities: BTreeMap<EntityId, Entity>,
    /// Ids handed out for entities whose addition is still queued.
    pending_entities: HashSet<EntityId>,
    matching: Vec<MatchingSet>,
    matching_by_key: HashMap<FamilyKey, usize>,
    systems: SystemTable,
    listeners: ListenerTable,
    pending: PendingQueue,
    updating: bool,
    /// Depth of listener notifications and attach/detach hooks in progress.
    callback_depth: u32,
    frame: u64,
}

impl Engine {
    /// Create an engine on the process-wide [`Registry`] with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine on the process-wide [`Registry`].
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_registry(Registry::shared(), config)
    }

    /// Create an engine on an explicit registry.
    #[must_use]
    pub fn with_registry(registry: Arc<Registry>, config: EngineConfig) -> Self {
        Self {
            registry,
            pending: PendingQueue::with_capacity(config.pending_capacity),
            config,
            next_entity_id: 1,
            entities: BTreeMap::new(),
            pending_entities: HashSet::new(),
            matching: Vec::new(),
            matching_by_key: HashMap::new(),
            systems: SystemTable::default(),
            listeners: ListenerTable::default(),
            updating: false,
            callback_depth: 0,
            frame: 0,
        }
    }

    /// The registry this engine resolves component kinds and families in.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of completed update passes.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Returns `true` while an update pass is running.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Number of structural operations waiting to be applied.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.pending.len()
    }

    /// Resolve (registering on first use) the kind index of `T`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Component`] if the kind registry is full.
    pub fn component_type<T: Component>(&self) -> Result<ComponentType, EngineError> {
        Ok(self.registry.component_type::<T>()?)
    }

    /// Intern the family `(all, one, exclude)` named by typed component sets.
    ///
    /// # Errors
    ///
    /// [`EngineError::Component`] if the kind registry is full.
    pub fn family<All: ComponentSet, One: ComponentSet, Exclude: ComponentSet>(
        &self,
    ) -> Result<Arc<Family>, EngineError> {
        Ok(self.registry.family::<All, One, Exclude>()?)
    }

    // -- Entities --

    /// Add an empty entity.
    pub fn create_entity(&mut self) -> EntityId {
        self.add_entity(Entity::new())
    }

    /// Hand a (possibly pre-populated) detached entity to the engine.
    ///
    /// The id is assigned immediately; if the engine is busy the entity joins
    /// the population and its matching sets when the deferred queue drains.
    pub fn add_entity(&mut self, mut entity: Entity) -> EntityId {
        let id = EntityId::from_raw(self.next_entity_id);
        self.next_entity_id += 1;
        entity.assign_id(id);
        entity.family_bits_mut().clear();

        if self.is_busy() {
            self.pending_entities.insert(id);
            self.pending.push(PendingOperation::AddEntity(entity));
        } else {
            self.add_entity_now(entity);
            self.flush_pending();
        }
        id
    }

    /// Remove an entity, leaving every matching set and dropping its
    /// components.
    ///
    /// # Errors
    ///
    /// [`EngineError::EntityNotFound`] if the engine does not know `id`.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), EngineError> {
        if let Some(entity) = self.entities.get_mut(&id) {
            if self.updating || self.callback_depth > 0 {
                entity.schedule_for_removal();
                self.pending.push(PendingOperation::RemoveEntity(id));
            } else {
                self.remove_entity_now(id);
                self.flush_pending();
            }
            Ok(())
        } else if self.pending_entities.contains(&id) {
            self.pending.push(PendingOperation::RemoveEntity(id));
            Ok(())
        } else {
            Err(EngineError::EntityNotFound(id))
        }
    }

    /// Remove every entity.
    pub fn remove_all_entities(&mut self) {
        self.request_remove_all(None);
    }

    /// Remove every entity currently matching `family`.
    pub fn remove_all_entities_for(&mut self, family: &Arc<Family>) {
        self.request_remove_all(Some(Arc::clone(family)));
    }

    /// Returns `true` if `id` is part of the live population.
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Borrow a live entity's record.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Iterate over live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of entities queued for addition that are not live yet.
    #[must_use]
    pub fn pending_entity_count(&self) -> usize {
        self.pending_entities.len()
    }

    /// Replace an entity's user flag bits. Not a structural change, so it
    /// applies immediately even mid-frame.
    ///
    /// # Errors
    ///
    /// [`EngineError::EntityNotFound`] if `id` is not live.
    pub fn set_entity_flags(&mut self, id: EntityId, flags: u32) -> Result<(), EngineError> {
        self.entities
            .get_mut(&id)
            .ok_or(EngineError::EntityNotFound(id))?
            .set_flags(flags);
        Ok(())
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    // -- Components --

    /// Attach `component` to an entity.
    ///
    /// If the entity already carries a `T`, the stored value is replaced and
    /// family membership is untouched.
    ///
    /// # Errors
    ///
    /// [`EngineError::EntityNotFound`] for an unknown entity,
    /// [`EngineError::Component`] if `T` cannot be registered.
    pub fn add_component<T: Component>(
        &mut self,
        id: EntityId,
        component: T,
    ) -> Result<(), EngineError> {
        self.ensure_known(id)?;
        let component_type = self.registry.component_type::<T>()?;

        if self.is_busy() {
            self.pending.push(PendingOperation::AddComponent {
                entity: id,
                component_type,
                component: Box::new(component),
            });
        } else {
            self.add_component_now(id, component_type, Box::new(component));
            self.flush_pending();
        }
        Ok(())
    }

    /// Detach the `T` component from an entity. Removing an absent kind is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`EngineError::EntityNotFound`] for an unknown entity.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Result<(), EngineError> {
        self.ensure_known(id)?;
        let Some(component_type) = self.registry.components().get::<T>() else {
            return Ok(());
        };

        if self.is_busy() {
            self.pending.push(PendingOperation::RemoveComponent {
                entity: id,
                component_type,
            });
        } else {
            self.remove_component_now(id, component_type);
            self.flush_pending();
        }
        Ok(())
    }

    /// Returns `true` if the live entity carries a `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.registry
            .components()
            .get::<T>()
            .zip(self.entities.get(&id))
            .is_some_and(|(component_type, entity)| entity.has(component_type))
    }

    /// Borrow an entity's `T` component.
    #[must_use]
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        let component_type = self.registry.components().get::<T>()?;
        self.entities.get(&id)?.get::<T>(component_type)
    }

    /// Mutably borrow an entity's `T` component. Changing component data is
    /// not structural and is allowed at any time.
    #[must_use]
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        let component_type = self.registry.components().get::<T>()?;
        self.entities.get_mut(&id)?.get_mut::<T>(component_type)
    }

    // -- Families --

    /// The live matching set for `family`.
    ///
    /// The first request registers the family with this engine and scans the
    /// population; later requests for the same criteria return a handle to the
    /// same set.
    pub fn entities_for(&mut self, family: &Arc<Family>) -> MatchingSet {
        if let Some(&pos) = self.matching_by_key.get(family.key()) {
            return self.matching[pos].clone();
        }
        self.register_family(family)
    }

    /// Number of families this engine maintains matching sets for.
    #[must_use]
    pub fn family_count(&self) -> usize {
        self.matching.len()
    }

    // -- Systems --

    /// Attach a system. Its `added_to_engine` hook fires before this returns,
    /// or when the deferred queue drains if the engine is busy.
    ///
    /// # Errors
    ///
    /// [`EngineError::SystemAlreadyAdded`] if a system of type `S` is attached
    /// or queued for attachment.
    pub fn add_system<S: System>(&mut self, system: S) -> Result<(), EngineError> {
        let type_id = TypeId::of::<S>();
        let name = std::any::type_name::<S>();
        if self.system_attached_after_pending(type_id) {
            return Err(EngineError::SystemAlreadyAdded(name));
        }

        let entry = SystemEntry::new(type_id, name, system.priority());
        if self.is_busy() {
            self.pending
                .push(PendingOperation::AddSystem(entry, Box::new(system)));
        } else {
            self.add_system_now(entry, Box::new(system));
            self.flush_pending();
        }
        Ok(())
    }

    /// Detach the system of type `S`, firing its `removed_from_engine` hook.
    ///
    /// # Errors
    ///
    /// [`EngineError::SystemNotFound`] if no `S` is attached (or it is already
    /// queued for removal).
    pub fn remove_system<S: System>(&mut self) -> Result<(), EngineError> {
        self.request_system_removal(TypeId::of::<S>(), std::any::type_name::<S>())
    }

    /// Detach every system (hooks fire) and remove every entity.
    pub fn shutdown(&mut self) {
        info!(
            systems = self.systems.len(),
            entities = self.entities.len(),
            "engine shutting down"
        );
        let attached: Vec<(TypeId, &'static str)> =
            self.systems.iter().map(|e| (e.type_id, e.name)).collect();
        for (type_id, name) in attached {
            if let Err(e) = self.request_system_removal(type_id, name) {
                debug!(%e, "system already queued for removal");
            }
        }
        self.remove_all_entities();
    }

    /// Borrow the attached system of type `S`. `None` while that system is
    /// itself running.
    #[must_use]
    pub fn get_system<S: System>(&self) -> Option<&S> {
        self.systems.get(TypeId::of::<S>())?.downcast_ref::<S>()
    }

    /// Mutably borrow the attached system of type `S`.
    #[must_use]
    pub fn get_system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.get_mut(TypeId::of::<S>())?.downcast_mut::<S>()
    }

    /// Change a system's priority. The new order takes effect from the next
    /// update pass.
    ///
    /// # Errors
    ///
    /// [`EngineError::SystemNotFound`] if no `S` is attached.
    pub fn set_system_priority<S: System>(&mut self, priority: i32) -> Result<(), EngineError> {
        if self.systems.set_priority(TypeId::of::<S>(), priority) {
            Ok(())
        } else {
            Err(EngineError::SystemNotFound(std::any::type_name::<S>()))
        }
    }

    /// The current priority of system `S`.
    #[must_use]
    pub fn system_priority<S: System>(&self) -> Option<i32> {
        self.systems.get(TypeId::of::<S>()).map(|e| e.priority)
    }

    /// Enable or disable system `S`. Disabled systems are skipped entirely by
    /// the update pass. Takes effect immediately, including for systems later
    /// in the current frame.
    ///
    /// # Errors
    ///
    /// [`EngineError::SystemNotFound`] if no `S` is attached.
    pub fn set_system_enabled<S: System>(&mut self, enabled: bool) -> Result<(), EngineError> {
        let entry = self
            .systems
            .get_mut(TypeId::of::<S>())
            .ok_or(EngineError::SystemNotFound(std::any::type_name::<S>()))?;
        entry.enabled = enabled;
        debug!(system = entry.name, enabled, "system toggled");
        Ok(())
    }

    /// Whether system `S` is enabled, or `None` if it is not attached.
    #[must_use]
    pub fn is_system_enabled<S: System>(&self) -> Option<bool> {
        self.systems.get(TypeId::of::<S>()).map(|e| e.enabled)
    }

    /// Number of attached systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Attached system type names in update order.
    #[must_use]
    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.names()
    }

    // -- Listeners --

    /// Register a listener for entities entering or leaving `family`.
    ///
    /// Listeners are notified in ascending `priority`, ties in registration
    /// order. Use the empty family to observe every entity.
    pub fn add_entity_listener<L: EntityListener>(
        &mut self,
        family: &Arc<Family>,
        priority: i32,
        listener: L,
    ) -> ListenerId {
        let id = self.listeners.next_id();
        let entry = ListenerEntry {
            id,
            family: Arc::clone(family),
            priority,
            listener: Some(Box::new(listener)),
        };
        if self.is_busy() {
            self.pending.push(PendingOperation::AddListener(entry));
        } else {
            self.listeners.insert(entry);
        }
        id
    }

    /// Unregister a listener.
    ///
    /// # Errors
    ///
    /// [`EngineError::ListenerNotFound`] if `id` is not registered.
    pub fn remove_entity_listener(&mut self, id: ListenerId) -> Result<(), EngineError> {
        let registered = self.listeners.contains(id);
        if !self.pending.listener_registered_after(id, registered) {
            return Err(EngineError::ListenerNotFound(id));
        }
        if self.is_busy() {
            self.pending.push(PendingOperation::RemoveListener(id));
        } else {
            self.listeners.remove(id);
        }
        Ok(())
    }

    // -- Update --

    /// Run one frame: every enabled system's `update`, in ascending priority
    /// (ties in insertion order).
    ///
    /// # Errors
    ///
    /// [`EngineError::ReentrantUpdate`] if called from inside a system,
    /// listener or hook. Any error returned by a system aborts the rest of
    /// the frame and is returned here after queued operations are applied.
    pub fn update(&mut self, dt: f32) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::ReentrantUpdate);
        }
        if self.systems.sort_if_dirty() {
            debug!(order = ?self.systems.names(), "system order recomputed");
        }

        self.updating = true;
        let result = self.run_systems(dt);
        self.flush_pending();
        self.updating = false;
        self.frame += 1;

        trace!(frame = self.frame, dt, entities = self.entities.len(), "frame complete");
        result
    }

    fn run_systems(&mut self, dt: f32) -> Result<(), EngineError> {
        for type_id in self.systems.order() {
            let Some(entry) = self.systems.get_mut(type_id) else {
                continue;
            };
            if !entry.enabled {
                continue;
            }
            let Some(mut system) = entry.system.take() else {
                continue;
            };
            let name = entry.name;

            let started = Instant::now();
            let result = system.update(self, dt);
            let elapsed = started.elapsed();

            if let Some(entry) = self.systems.get_mut(type_id) {
                entry.system = Some(system);
            }
            self.report_slow_system(name, elapsed);
            self.flush_pending();
            result?;
        }
        Ok(())
    }

    fn report_slow_system(&self, name: &'static str, elapsed: Duration) {
        let Some(budget_ms) = self.config.slow_system_threshold_ms else {
            return;
        };
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if elapsed_ms > budget_ms {
            warn!(
                frame = self.frame,
                system = name,
                elapsed_ms,
                budget_ms,
                "system exceeded time budget"
            );
        }
    }

    // -- Internals --

    fn is_busy(&self) -> bool {
        self.updating || self.callback_depth > 0
    }

    fn ensure_known(&self, id: EntityId) -> Result<(), EngineError> {
        if self.entities.contains_key(&id) || self.pending_entities.contains(&id) {
            Ok(())
        } else {
            Err(EngineError::EntityNotFound(id))
        }
    }

    fn system_attached_after_pending(&self, type_id: TypeId) -> bool {
        self.pending
            .system_attached_after(type_id, self.systems.contains(type_id))
    }

    fn request_system_removal(
        &mut self,
        type_id: TypeId,
        name: &'static str,
    ) -> Result<(), EngineError> {
        if !self.system_attached_after_pending(type_id) {
            return Err(EngineError::SystemNotFound(name));
        }
        if self.is_busy() {
            self.pending.push(PendingOperation::RemoveSystem(type_id));
        } else {
            self.remove_system_now(type_id);
            self.flush_pending();
        }
        Ok(())
    }

    fn request_remove_all(&mut self, family: Option<Arc<Family>>) {
        if self.is_busy() {
            for entity in self.entities.values_mut() {
                if family.as_ref().is_none_or(|f| f.matches(entity.component_bits())) {
                    entity.schedule_for_removal();
                }
            }
            self.pending.push(PendingOperation::RemoveAllEntities(family));
        } else {
            self.remove_all_now(family.as_ref());
            self.flush_pending();
        }
    }

    fn flush_pending(&mut self) {
        while let Some(op) = self.pending.pop() {
            self.apply(op);
        }
    }

    fn apply(&mut self, op: PendingOperation) {
        match op {
            PendingOperation::AddEntity(entity) => {
                self.pending_entities.remove(&entity.id());
                self.add_entity_now(entity);
            }
            PendingOperation::RemoveEntity(id) => self.remove_entity_now(id),
            PendingOperation::RemoveAllEntities(family) => self.remove_all_now(family.as_ref()),
            PendingOperation::AddComponent {
                entity,
                component_type,
                component,
            } => self.add_component_now(entity, component_type, component),
            PendingOperation::RemoveComponent {
                entity,
                component_type,
            } => self.remove_component_now(entity, component_type),
            PendingOperation::AddSystem(entry, system) => self.add_system_now(entry, system),
            PendingOperation::RemoveSystem(type_id) => self.remove_system_now(type_id),
            PendingOperation::AddListener(entry) => self.listeners.insert(entry),
            PendingOperation::RemoveListener(id) => {
                self.listeners.remove(id);
            }
        }
    }

    fn add_entity_now(&mut self, mut entity: Entity) {
        let id = entity.id();
        let bits = *entity.component_bits();
        for set in &self.matching {
            if set.family().matches(&bits) {
                set.push(id);
                entity.family_bits_mut().insert(set.family().index());
            }
        }
        self.entities.insert(id, entity);
        debug!(entity = %id, components = bits.len(), "entity added");

        self.notify(id, None, Some(bits));
    }

    fn remove_entity_now(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get_mut(&id) else {
            debug!(entity = %id, "dropping deferred removal of an entity that is already gone");
            return;
        };
        let bits = *entity.component_bits();
        let memberships = std::mem::take(entity.family_bits_mut());
        entity.schedule_for_removal();

        for set in &self.matching {
            if memberships.contains(set.family().index()) {
                set.remove(id);
            }
        }

        // Listeners still see the entity and its components.
        self.notify(id, Some(bits), None);
        self.entities.remove(&id);
        debug!(entity = %id, "entity removed");
    }

    fn remove_all_now(&mut self, family: Option<&Arc<Family>>) {
        let doomed: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| family.is_none_or(|f| f.matches(e.component_bits())))
            .map(Entity::id)
            .collect();
        debug!(count = doomed.len(), "removing entities");
        for id in doomed {
            self.remove_entity_now(id);
        }
    }

    fn add_component_now(
        &mut self,
        id: EntityId,
        component_type: ComponentType,
        component: Box<dyn Any>,
    ) {
        let Some(entity) = self.entities.get_mut(&id) else {
            debug!(entity = %id, %component_type, "dropping component for an entity that is gone");
            return;
        };
        let before = *entity.component_bits();
        if !entity.insert(component_type, component) {
            trace!(entity = %id, %component_type, "component replaced");
            return;
        }
        trace!(entity = %id, %component_type, "component added");
        self.refresh_membership(id, before);
    }

    fn remove_component_now(&mut self, id: EntityId, component_type: ComponentType) {
        let Some(entity) = self.entities.get_mut(&id) else {
            debug!(entity = %id, %component_type, "dropping component removal for an entity that is gone");
            return;
        };
        if !entity.has(component_type) {
            return;
        }
        let before = *entity.component_bits();
        entity.take(component_type);
        trace!(entity = %id, %component_type, "component removed");
        self.refresh_membership(id, before);
    }

    /// Re-test one entity against every registered family after its bits
    /// changed from `before`.
    fn refresh_membership(&mut self, id: EntityId, before: ComponentBits) {
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };
        let after = *entity.component_bits();
        for set in &self.matching {
            let index = set.family().index();
            let was = entity.family_bits().contains(index);
            let now = set.family().matches(&after);
            if was && !now {
                set.remove(id);
                entity.family_bits_mut().remove(index);
            } else if !was && now {
                set.push(id);
                entity.family_bits_mut().insert(index);
            }
        }

        self.notify(id, Some(before), Some(after));
    }

    fn register_family(&mut self, family: &Arc<Family>) -> MatchingSet {
        // Families from another registry are mapped onto this registry's
        // instance so indices stay unique.
        let family = self.registry.families().intern(*family.key());
        let set = MatchingSet::new(Arc::clone(&family));
        // An entity being torn down may still be in the map while listeners
        // run; it must not join a set it will never be removed from.
        for entity in self.entities.values_mut() {
            if family.matches(entity.component_bits()) && !entity.is_scheduled_for_removal() {
                set.push(entity.id());
                entity.family_bits_mut().insert(family.index());
            }
        }

        debug!(family = family.index(), matched = set.len(), "family registered");
        self.matching_by_key.insert(*family.key(), self.matching.len());
        self.matching.push(set.clone());
        set
    }

    fn add_system_now(&mut self, entry: SystemEntry, mut system: Box<dyn System>) {
        let type_id = entry.type_id;
        info!(system = entry.name, priority = entry.priority, "system added");
        self.systems.insert(entry);

        self.callback_depth += 1;
        system.added_to_engine(self);
        self.callback_depth -= 1;

        if let Some(entry) = self.systems.get_mut(type_id) {
            entry.system = Some(system);
        }
    }

    fn remove_system_now(&mut self, type_id: TypeId) {
        let Some(mut entry) = self.systems.remove(type_id) else {
            debug!("dropping deferred removal of a system that is already gone");
            return;
        };
        info!(system = entry.name, "system removed");
        if let Some(mut system) = entry.system.take() {
            self.callback_depth += 1;
            system.removed_from_engine(self);
            self.callback_depth -= 1;
        }
    }

    /// Notify listeners whose family membership for `entity` changed between
    /// `before` and `after` (`None` meaning "not in the engine").
    fn notify(&mut self, entity: EntityId, before: Option<ComponentBits>, after: Option<ComponentBits>) {
        let events: Vec<(ListenerId, bool)> = self
            .listeners
            .iter()
            .filter_map(|l| {
                let was = before.is_some_and(|b| l.family.matches(&b));
                let now = after.is_some_and(|b| l.family.matches(&b));
                match (was, now) {
                    (false, true) => Some((l.id, true)),
                    (true, false) => Some((l.id, false)),
                    _ => None,
                }
            })
            .collect();
        if events.is_empty() {
            return;
        }

        self.callback_depth += 1;
        for (id, added) in events {
            let Some(mut listener) = self.listeners.take(id) else {
                continue;
            };
            if added {
                listener.entity_added(self, entity);
            } else {
                listener.entity_removed(self, entity);
            }
            self.listeners.restore(id, listener);
        }
        self.callback_depth -= 1;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("frame", &self.frame)
            .field("entities", &self.entities.len())
            .field("families", &self.matching.len())
            .field("systems", &self.systems.names())
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending.len())
            .field("updating", &self.updating)
            .finish()
    }
}
