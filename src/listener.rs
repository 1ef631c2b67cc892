//! Listener registry.

use uuid::Uuid;

use crate::backend::{Backend, BackendListener};
use crate::math::{Transformation, Vec3};

pub type ListenerId = Uuid;

/// A registered listener with its backend-side handle.
pub struct AudioListener {
    id: ListenerId,
    name: String,
    transformation: Transformation,
    previous_position: Vec3,
    velocity: Vec3,
    backend_handle: Option<Box<dyn BackendListener>>,
}

impl AudioListener {
    fn new(name: &str, backend_handle: Option<Box<dyn BackendListener>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            transformation: Transformation::identity(),
            previous_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            backend_handle,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    pub fn set_transformation(&mut self, transformation: Transformation) {
        self.transformation = transformation;
        if let Some(handle) = self.backend_handle.as_deref_mut() {
            handle.set_transformation(&transformation);
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn update(&mut self, delta_time: f32) {
        if delta_time > 0.0 {
            self.velocity = (self.transformation.position - self.previous_position) / delta_time;
            self.previous_position = self.transformation.position;
        }
        if let Some(handle) = self.backend_handle.as_deref_mut() {
            handle.update();
        }
    }
}

/// Owns every registered listener and keeps their backend handles in sync
/// across backend swaps.
#[derive(Default)]
pub struct ListenerManager {
    listeners: Vec<AudioListener>,
}

impl ListenerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: &str, backend: Option<&mut (dyn Backend + 'static)>) -> ListenerId {
        let handle = backend.map(|b| b.construct_listener(name));
        let listener = AudioListener::new(name, handle);
        let id = listener.id();
        self.listeners.push(listener);
        id
    }

    pub fn release(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id() != id);
        before != self.listeners.len()
    }

    pub fn get_mut(&mut self, id: ListenerId) -> Option<&mut AudioListener> {
        self.listeners.iter_mut().find(|l| l.id() == id)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Transformation of the active listener; identity when none registered.
    ///
    /// The first registered listener is the active one.
    pub fn active_transformation(&self) -> Transformation {
        self.listeners
            .first()
            .map(|l| *l.transformation())
            .unwrap_or_default()
    }

    pub fn active_position(&self) -> Vec3 {
        self.active_transformation().position
    }

    pub fn update(&mut self, delta_time: f32) {
        for listener in &mut self.listeners {
            listener.update(delta_time);
        }
    }

    /// Drops all backend handles; listener data survives the swap.
    pub fn release_backend_data(&mut self) {
        for listener in &mut self.listeners {
            listener.backend_handle = None;
        }
    }

    /// Constructs fresh backend handles and re-applies transformations.
    pub fn rebind(&mut self, backend: &mut dyn Backend) {
        for listener in &mut self.listeners {
            let mut handle = backend.construct_listener(&listener.name);
            handle.set_transformation(&listener.transformation);
            listener.backend_handle = Some(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_listener_is_active() {
        let mut manager = ListenerManager::new();
        assert_eq!(manager.active_position(), Vec3::ZERO);

        let id = manager.create("player", None);
        manager
            .get_mut(id)
            .unwrap()
            .set_transformation(Transformation::from_position(Vec3::new(1.0, 2.0, 3.0)));
        manager.create("spectator", None);

        assert_eq!(manager.active_position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn release_removes_listener() {
        let mut manager = ListenerManager::new();
        let id = manager.create("player", None);

        assert!(manager.release(id));
        assert!(!manager.release(id));
        assert!(manager.is_empty());
    }
}
