//! Pooled audio objects and their derived virtualization state.

use ahash::AHashMap;
use bitflags::bitflags;

use crate::backend::{Backend, BackendObject};
use crate::controls::{
    ABSOLUTE_VELOCITY_PARAMETER_ID, ControlId, RELATIVE_VELOCITY_PARAMETER_ID,
};
use crate::event::{AudioEvent, EventId, StandaloneFileId, TriggerInstanceId};
use crate::math::{Transformation, Vec3};
use crate::pool::{Handle, Pool};
use crate::request::RequestStatus;

pub type ObjectId = Handle<AudioObject>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u32 {
        const IN_USE = 1 << 0;
        const VIRTUAL = 1 << 1;
        const TRACK_ABSOLUTE_VELOCITY = 1 << 2;
        const TRACK_RELATIVE_VELOCITY = 1 << 3;
    }
}

/// How occlusion rays are run for an object. `Ignore` disables occlusion and
/// zeroes the object's obstruction/occlusion values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcclusionType {
    #[default]
    Ignore,
    Adaptive,
    Low,
    Medium,
    High,
}

/// Result of one asynchronous physics occlusion ray, re-entering the engine
/// as an object request.
#[derive(Debug, Clone, Copy)]
pub struct RayInfo {
    pub occlusion: f32,
    pub distance: f32,
}

/// Bookkeeping for one trigger execution; the finished-trigger notification
/// fires when the last pending event of the instance reports finished.
#[derive(Debug, Clone)]
pub struct TriggerInstanceState {
    pub trigger_id: ControlId,
    pub owner: Option<u64>,
    pub user_data: Option<u64>,
    pub user_data_owner: Option<u64>,
    pub pending_events: u32,
}

/// A sound-emitting point in space.
pub struct AudioObject {
    name: String,
    backend_handle: Option<Box<dyn BackendObject>>,
    transformation: Transformation,
    previous_position: Vec3,
    previous_relative_position: Vec3,
    absolute_velocity: f32,
    relative_velocity: f32,
    flags: ObjectFlags,
    occlusion_type: OcclusionType,
    occlusion: f32,
    active_events: Vec<EventId>,
    active_files: Vec<StandaloneFileId>,
    environments: AHashMap<ControlId, f32>,
    trigger_instances: AHashMap<TriggerInstanceId, TriggerInstanceState>,
    pending_rays: u32,
}

impl AudioObject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            backend_handle: None,
            transformation: Transformation::identity(),
            previous_position: Vec3::ZERO,
            previous_relative_position: Vec3::ZERO,
            absolute_velocity: 0.0,
            relative_velocity: 0.0,
            flags: ObjectFlags::IN_USE,
            occlusion_type: OcclusionType::Ignore,
            occlusion: 0.0,
            active_events: Vec::new(),
            active_files: Vec::new(),
            environments: AHashMap::new(),
            trigger_instances: AHashMap::new(),
            pending_rays: 0,
        }
    }

    /// Binds the backend-side handle. An in-use object must be bound before
    /// any playback request reaches it.
    pub fn bind(&mut self, handle: Box<dyn BackendObject>) {
        self.backend_handle = Some(handle);
    }

    pub fn is_bound(&self) -> bool {
        self.backend_handle.is_some()
    }

    pub fn backend(&mut self) -> Option<&mut (dyn BackendObject + 'static)> {
        self.backend_handle.as_deref_mut()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the object. A changed name requires the backend-side handle to
    /// be rebuilt, which the dispatcher performs on `SuccessNeedsRefresh`.
    pub fn set_name(&mut self, name: &str) -> RequestStatus {
        if self.name == name {
            return RequestStatus::Success;
        }
        self.name = name.to_string();
        RequestStatus::SuccessNeedsRefresh
    }

    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: ObjectFlags) {
        self.flags.insert(flag);
    }

    pub fn remove_flag(&mut self, flag: ObjectFlags) {
        self.flags.remove(flag);
    }

    pub fn is_in_use(&self) -> bool {
        self.flags.contains(ObjectFlags::IN_USE)
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.contains(ObjectFlags::VIRTUAL)
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    pub fn set_transformation(&mut self, transformation: Transformation) -> RequestStatus {
        self.transformation = transformation;
        match self.backend() {
            Some(handle) => handle.set_transformation(&transformation),
            None => RequestStatus::Failure,
        }
    }

    pub fn occlusion_type(&self) -> OcclusionType {
        self.occlusion_type
    }

    pub fn set_occlusion_type(&mut self, occlusion_type: OcclusionType) {
        self.occlusion_type = occlusion_type;

        if occlusion_type == OcclusionType::Ignore {
            self.occlusion = 0.0;
            if let Some(handle) = self.backend() {
                handle.set_obstruction_occlusion(0.0, 0.0);
            }
        }
    }

    pub fn set_environment(&mut self, environment_id: ControlId, amount: f32) -> RequestStatus {
        self.environments.insert(environment_id, amount);
        match self.backend() {
            Some(handle) => handle.set_environment(environment_id, amount),
            None => RequestStatus::Failure,
        }
    }

    pub fn active_events(&self) -> &[EventId] {
        &self.active_events
    }

    pub fn add_event(&mut self, event_id: EventId) {
        if !self.active_events.contains(&event_id) {
            self.active_events.push(event_id);
        }
    }

    /// Removes a finished event and re-derives the virtual flag from the
    /// remaining active events.
    pub fn remove_event(&mut self, event_id: EventId, events: &Pool<AudioEvent>) {
        self.active_events.retain(|id| *id != event_id);
        self.refresh_virtual_state(events);
    }

    pub fn add_file(&mut self, file_id: StandaloneFileId) {
        if !self.active_files.contains(&file_id) {
            self.active_files.push(file_id);
        }
    }

    pub fn remove_file(&mut self, file_id: StandaloneFileId) {
        self.active_files.retain(|id| *id != file_id);
    }

    /// Re-derives the virtual flag: set iff the object has at least one active
    /// event and every one of them is virtual. Returns true when the object
    /// just became virtual.
    pub fn refresh_virtual_state(&mut self, events: &Pool<AudioEvent>) -> bool {
        let was_virtual = self.is_virtual();
        let all_virtual = !self.active_events.is_empty()
            && self
                .active_events
                .iter()
                .all(|id| events.get(*id).map(AudioEvent::is_virtual).unwrap_or(true));

        if all_virtual {
            self.flags.insert(ObjectFlags::VIRTUAL);
        } else {
            self.flags.remove(ObjectFlags::VIRTUAL);
        }

        !was_virtual && all_virtual
    }

    pub fn add_trigger_instance(&mut self, id: TriggerInstanceId, state: TriggerInstanceState) {
        self.trigger_instances.insert(id, state);
    }

    /// Records that one event of the instance finished; returns the instance
    /// state once no events remain pending.
    pub fn finish_trigger_event(
        &mut self,
        id: TriggerInstanceId,
    ) -> Option<TriggerInstanceState> {
        let instance = self.trigger_instances.get_mut(&id)?;
        instance.pending_events = instance.pending_events.saturating_sub(1);

        if instance.pending_events == 0 {
            return self.trigger_instances.remove(&id);
        }
        None
    }

    pub fn add_pending_ray(&mut self) {
        self.pending_rays += 1;
    }

    pub fn process_physics_ray(&mut self, ray: &RayInfo) {
        self.pending_rays = self.pending_rays.saturating_sub(1);
        self.occlusion = ray.occlusion.clamp(0.0, 1.0);
        let occlusion = self.occlusion;
        if let Some(handle) = self.backend() {
            handle.set_obstruction_occlusion(0.0, occlusion);
        }
    }

    pub fn clear_pending_rays(&mut self) {
        self.pending_rays = 0;
    }

    pub fn occlusion(&self) -> f32 {
        self.occlusion
    }

    /// Per-frame advance: velocity tracking (when flagged) and the backend
    /// handle's own update.
    pub fn update(&mut self, delta_time: f32, listener_position: Vec3) {
        if delta_time > 0.0 {
            if self.flags.contains(ObjectFlags::TRACK_ABSOLUTE_VELOCITY) {
                let velocity =
                    self.transformation.position.distance(self.previous_position) / delta_time;
                if (velocity - self.absolute_velocity).abs() > f32::EPSILON {
                    self.absolute_velocity = velocity;
                    if let Some(handle) = self.backend() {
                        handle.set_parameter(ABSOLUTE_VELOCITY_PARAMETER_ID, velocity);
                    }
                }
            }

            if self.flags.contains(ObjectFlags::TRACK_RELATIVE_VELOCITY) {
                let relative = self.transformation.position - listener_position;
                let velocity = relative.distance(self.previous_relative_position) / delta_time;
                if (velocity - self.relative_velocity).abs() > f32::EPSILON {
                    self.relative_velocity = velocity;
                    if let Some(handle) = self.backend() {
                        handle.set_parameter(RELATIVE_VELOCITY_PARAMETER_ID, velocity);
                    }
                }
            }

            self.previous_position = self.transformation.position;
            self.previous_relative_position = self.transformation.position - listener_position;
        }

        if let Some(handle) = self.backend() {
            handle.update();
        }
    }

    pub fn absolute_velocity(&self) -> f32 {
        self.absolute_velocity
    }

    /// Stops tracking a velocity kind, resetting the backend parameter.
    pub fn reset_velocity_tracking(&mut self, parameter_id: ControlId) {
        if parameter_id == ABSOLUTE_VELOCITY_PARAMETER_ID {
            self.absolute_velocity = 0.0;
        } else {
            self.relative_velocity = 0.0;
        }
        if let Some(handle) = self.backend() {
            handle.set_parameter(parameter_id, 0.0);
        }
    }

    /// Drops the backend-side handle; engine-side state survives so the
    /// object can be rebound after a backend swap.
    pub fn release_backend_data(&mut self) {
        self.backend_handle = None;
        self.active_events.clear();
        self.active_files.clear();
        self.trigger_instances.clear();
        self.flags.remove(ObjectFlags::VIRTUAL);
        self.clear_pending_rays();
    }

    /// Constructs a fresh backend handle and re-applies the cached state.
    /// Used after a backend swap and after a rename.
    pub fn rebind(&mut self, backend: &mut dyn Backend) {
        let mut handle = backend.construct_object(&self.name);
        handle.set_transformation(&self.transformation);

        if self.occlusion_type == OcclusionType::Ignore {
            handle.set_obstruction_occlusion(0.0, 0.0);
        } else {
            handle.set_obstruction_occlusion(0.0, self.occlusion);
        }

        for (environment_id, amount) in &self.environments {
            handle.set_environment(*environment_id, *amount);
        }

        self.backend_handle = Some(handle);
    }

    /// True when the deferred reclamation sweep may free this slot.
    pub fn can_be_reclaimed(&self) -> bool {
        !self.is_in_use()
            && self.active_events.is_empty()
            && self.active_files.is_empty()
            && self.pending_rays == 0
    }
}

/// Resolves a request target, defaulting to the global object.
pub(crate) fn resolve_target<'a>(
    global: &'a mut AudioObject,
    pool: &'a mut Pool<AudioObject>,
    target: Option<ObjectId>,
) -> Option<&'a mut AudioObject> {
    match target {
        None => Some(global),
        Some(id) => pool.get_mut(id),
    }
}

/// Frees every pooled object whose deferred release has no remaining
/// dependents. Returns the number of reclaimed slots.
pub(crate) fn reclaim(pool: &mut Pool<AudioObject>) -> usize {
    let reclaimable: Vec<ObjectId> = pool
        .iter()
        .filter(|(_, object)| object.can_be_reclaimed())
        .map(|(id, _)| id)
        .collect();

    let count = reclaimable.len();
    for id in reclaimable {
        pool.release(id);
    }
    if count > 0 {
        log::debug!("reclaimed {} audio object slot(s)", count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventState;

    #[test]
    fn virtual_flag_follows_event_states() {
        let mut events: Pool<AudioEvent> = Pool::new(4);
        let mut object = AudioObject::new("emitter");

        let a = events.allocate(AudioEvent::new(None, 1, 0));
        let b = events.allocate(AudioEvent::new(None, 1, 0));
        object.add_event(a);
        object.add_event(b);

        events.get_mut(a).unwrap().state = EventState::Virtual;
        assert!(!object.refresh_virtual_state(&events));
        assert!(!object.is_virtual());

        events.get_mut(b).unwrap().state = EventState::Virtual;
        assert!(object.refresh_virtual_state(&events));
        assert!(object.is_virtual());

        // Removing the last event leaves the object audible-capable again.
        events.release(a);
        object.remove_event(a, &events);
        events.release(b);
        object.remove_event(b, &events);
        assert!(!object.is_virtual());
    }

    #[test]
    fn trigger_instance_completes_after_last_event() {
        let mut object = AudioObject::new("emitter");
        object.add_trigger_instance(
            7,
            TriggerInstanceState {
                trigger_id: 42,
                owner: Some(1),
                user_data: None,
                user_data_owner: None,
                pending_events: 2,
            },
        );

        assert!(object.finish_trigger_event(7).is_none());
        let done = object.finish_trigger_event(7).expect("instance complete");
        assert_eq!(done.trigger_id, 42);
        assert!(object.finish_trigger_event(7).is_none());
    }

    #[test]
    fn reclaim_skips_objects_with_live_dependents() {
        let mut pool: Pool<AudioObject> = Pool::new(2);
        let busy = pool.allocate(AudioObject::new("busy"));
        let idle = pool.allocate(AudioObject::new("idle"));

        let mut events: Pool<AudioEvent> = Pool::new(1);
        let event = events.allocate(AudioEvent::new(Some(busy), 1, 0));

        pool.get_mut(busy).unwrap().remove_flag(ObjectFlags::IN_USE);
        pool.get_mut(busy).unwrap().add_event(event);
        pool.get_mut(idle).unwrap().remove_flag(ObjectFlags::IN_USE);

        assert_eq!(reclaim(&mut pool), 1);
        assert!(pool.contains(busy));
        assert!(!pool.contains(idle));
    }
}
