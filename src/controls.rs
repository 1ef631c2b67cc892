//! Immutable control definitions and their lookup tables.
//!
//! The engine never mutates these; the external control-data loader populates
//! the registry per scope and the engine only dereferences entries by id.

use ahash::AHashMap;

pub type ControlId = u32;
pub type SwitchStateId = u32;
pub type PreloadRequestId = u32;

pub const INVALID_CONTROL_ID: ControlId = 0;

/// Stable id for a control name, FNV-1a over the lowercased name.
pub const fn string_to_id(name: &str) -> ControlId {
    let bytes = name.as_bytes();
    let mut hash: u32 = 0x811c_9dc5;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i].to_ascii_lowercase() as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash
}

/// Reserved parameter driven by the engine when absolute velocity tracking is
/// enabled on an object.
pub const ABSOLUTE_VELOCITY_PARAMETER_ID: ControlId = string_to_id("absolute_velocity");
/// Reserved parameter driven by the engine when relative velocity tracking is
/// enabled on an object.
pub const RELATIVE_VELOCITY_PARAMETER_ID: ControlId = string_to_id("relative_velocity");
/// Preload request loaded during a full refresh, before any level data.
pub const GLOBAL_PRELOAD_REQUEST_ID: PreloadRequestId = string_to_id("global_audio_system_preload");

/// Classification of loaded control/preload data, controlling bulk clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataScope {
    Global,
    LevelSpecific,
    All,
}

impl DataScope {
    fn matches(&self, other: DataScope) -> bool {
        matches!(self, DataScope::All) || *self == other
    }
}

/// One backend-side action of a trigger; the key is opaque to the engine.
#[derive(Debug, Clone)]
pub struct TriggerAction {
    pub key: String,
}

/// A named, pre-authored action producing one event per action when executed.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub id: ControlId,
    pub name: String,
    pub scope: DataScope,
    /// Maximum audible distance, exposed for debug introspection.
    pub radius: f32,
    pub actions: Vec<TriggerAction>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: ControlId,
    pub name: String,
    pub scope: DataScope,
}

#[derive(Debug, Clone)]
pub struct SwitchState {
    pub id: SwitchStateId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Switch {
    pub id: ControlId,
    pub name: String,
    pub scope: DataScope,
    pub states: AHashMap<SwitchStateId, SwitchState>,
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub id: ControlId,
    pub name: String,
    pub scope: DataScope,
}

/// Read-only lookup tables keyed by control id.
#[derive(Default)]
pub struct ControlRegistry {
    triggers: AHashMap<ControlId, Trigger>,
    parameters: AHashMap<ControlId, Parameter>,
    switches: AHashMap<ControlId, Switch>,
    environments: AHashMap<ControlId, Environment>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.triggers.insert(trigger.id, trigger);
    }

    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter.id, parameter);
    }

    pub fn add_switch(&mut self, switch: Switch) {
        self.switches.insert(switch.id, switch);
    }

    pub fn add_environment(&mut self, environment: Environment) {
        self.environments.insert(environment.id, environment);
    }

    pub fn trigger(&self, id: ControlId) -> Option<&Trigger> {
        self.triggers.get(&id)
    }

    pub fn parameter(&self, id: ControlId) -> Option<&Parameter> {
        self.parameters.get(&id)
    }

    pub fn switch(&self, id: ControlId) -> Option<&Switch> {
        self.switches.get(&id)
    }

    pub fn environment(&self, id: ControlId) -> Option<&Environment> {
        self.environments.get(&id)
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Removes every control whose scope matches `scope`.
    pub fn clear(&mut self, scope: DataScope) {
        self.triggers.retain(|_, t| !scope.matches(t.scope));
        self.parameters.retain(|_, p| !scope.matches(p.scope));
        self.switches.retain(|_, s| !scope.matches(s.scope));
        self.environments.retain(|_, e| !scope.matches(e.scope));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(name: &str, scope: DataScope) -> Trigger {
        Trigger {
            id: string_to_id(name),
            name: name.to_string(),
            scope,
            radius: 0.0,
            actions: vec![TriggerAction {
                key: name.to_string(),
            }],
        }
    }

    #[test]
    fn ids_are_stable_and_case_insensitive() {
        assert_eq!(string_to_id("Explosion"), string_to_id("explosion"));
        assert_ne!(string_to_id("explosion"), string_to_id("footstep"));
    }

    #[test]
    fn clear_by_scope_removes_only_matching_controls() {
        let mut registry = ControlRegistry::new();
        registry.add_trigger(trigger("global_music", DataScope::Global));
        registry.add_trigger(trigger("level_ambience", DataScope::LevelSpecific));

        registry.clear(DataScope::LevelSpecific);
        assert!(registry.trigger(string_to_id("global_music")).is_some());
        assert!(registry.trigger(string_to_id("level_ambience")).is_none());

        registry.clear(DataScope::All);
        assert_eq!(registry.trigger_count(), 0);
    }
}
