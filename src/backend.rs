//! The swappable low-level audio backend abstraction.
//!
//! At most one backend is active at a time; [`NullBackend`] is the built-in
//! no-op implementation the engine falls back to so that there is always
//! *some* backend to drive. Backends report event/file outcomes by sending
//! callback [`Request`]s through the channel handed to [`Backend::init`];
//! the engine drains and dispatches them on the control thread.

use crate::controls::{ControlId, SwitchStateId, Trigger, TriggerAction};
use crate::event::{EventId, StandaloneFileId};
use crate::math::Transformation;
use crate::request::{Request, RequestStatus};

/// Channel endpoint a backend uses to hand outcome reports back to the engine.
pub type ReportSender = crossbeam_channel::Sender<Request>;

/// Descriptive data about the active backend.
#[derive(Debug, Clone, Default)]
pub struct BackendInfo {
    pub name: String,
    /// Folder the backend's control data lives under, below the data root.
    pub folder_name: String,
}

/// Per-file data exposed for introspection.
#[derive(Debug, Clone, Default)]
pub struct FileData {
    pub duration_seconds: f32,
}

/// Memory usage snapshot exposed for debug instrumentation.
#[derive(Debug, Clone, Default)]
pub struct MemoryInfo {
    pub total_allocated_bytes: usize,
    pub pool_used_objects: usize,
    pub pool_constructed_objects: usize,
    pub pool_used_bytes: usize,
    pub pool_allocated_bytes: usize,
}

/// Backend-side counterpart of one audio object.
///
/// Handles are constructed by the backend and owned by the engine; dropping a
/// handle releases the backend-side resources.
pub trait BackendObject: Send {
    /// Starts one action of a trigger; the backend reports the event's
    /// lifecycle back through the report channel using `event_id`.
    fn execute_trigger(
        &mut self,
        trigger: &Trigger,
        action: &TriggerAction,
        event_id: EventId,
    ) -> RequestStatus;
    fn stop_trigger(&mut self, trigger_id: ControlId) -> RequestStatus;
    fn stop_all_triggers(&mut self) -> RequestStatus;
    /// Loads or unloads the trigger's resources without playing it.
    fn load_trigger_async(&mut self, trigger: &Trigger, load: bool) -> RequestStatus;
    fn set_parameter(&mut self, parameter_id: ControlId, value: f32) -> RequestStatus;
    fn set_switch_state(&mut self, switch_id: ControlId, state_id: SwitchStateId)
    -> RequestStatus;
    fn set_environment(&mut self, environment_id: ControlId, amount: f32) -> RequestStatus;
    fn set_transformation(&mut self, transformation: &Transformation) -> RequestStatus;
    fn set_obstruction_occlusion(&mut self, obstruction: f32, occlusion: f32) -> RequestStatus;
    fn play_file(
        &mut self,
        file_id: StandaloneFileId,
        path: &str,
        localized: bool,
    ) -> RequestStatus;
    fn stop_file(&mut self, path: &str) -> RequestStatus;
    fn update(&mut self);
}

/// Backend-side counterpart of one listener.
pub trait BackendListener: Send {
    fn set_transformation(&mut self, transformation: &Transformation);
    fn update(&mut self);
}

/// The swappable audio-rendering implementation the engine drives.
pub trait Backend: Send {
    /// Initializes the backend with the engine's pool bounds.
    ///
    /// An implementation that fails to initialize must clean up after itself;
    /// the engine will call [`Backend::release`] but not [`Backend::shut_down`]
    /// on it before falling back to the null backend.
    fn init(
        &mut self,
        object_pool_size: u32,
        event_pool_size: u32,
        reports: ReportSender,
    ) -> RequestStatus;
    fn shut_down(&mut self);
    fn release(&mut self);
    fn update(&mut self);
    /// Called during a full audio system refresh, between unload and re-parse.
    fn on_refresh(&mut self);
    fn stop_all_sounds(&mut self) -> RequestStatus;
    fn set_language(&mut self, language: &str);
    fn construct_object(&mut self, name: &str) -> Box<dyn BackendObject>;
    fn construct_global_object(&mut self) -> Box<dyn BackendObject>;
    fn construct_listener(&mut self, name: &str) -> Box<dyn BackendListener>;
    fn gamepad_connected(&mut self, device_id: u64);
    fn gamepad_disconnected(&mut self, device_id: u64);
    fn info(&self) -> BackendInfo;
    fn file_data(&self, name: &str) -> Option<FileData>;
    fn memory_info(&self) -> MemoryInfo;
}

/// No-op backend used whenever no real implementation is available.
#[derive(Debug, Default)]
pub struct NullBackend;

struct NullBackendObject;

impl BackendObject for NullBackendObject {
    fn execute_trigger(
        &mut self,
        _trigger: &Trigger,
        _action: &TriggerAction,
        _event_id: EventId,
    ) -> RequestStatus {
        RequestStatus::Success
    }

    fn stop_trigger(&mut self, _trigger_id: ControlId) -> RequestStatus {
        RequestStatus::Success
    }

    fn stop_all_triggers(&mut self) -> RequestStatus {
        RequestStatus::Success
    }

    fn load_trigger_async(&mut self, _trigger: &Trigger, _load: bool) -> RequestStatus {
        RequestStatus::Success
    }

    fn set_parameter(&mut self, _parameter_id: ControlId, _value: f32) -> RequestStatus {
        RequestStatus::Success
    }

    fn set_switch_state(
        &mut self,
        _switch_id: ControlId,
        _state_id: SwitchStateId,
    ) -> RequestStatus {
        RequestStatus::Success
    }

    fn set_environment(&mut self, _environment_id: ControlId, _amount: f32) -> RequestStatus {
        RequestStatus::Success
    }

    fn set_transformation(&mut self, _transformation: &Transformation) -> RequestStatus {
        RequestStatus::Success
    }

    fn set_obstruction_occlusion(&mut self, _obstruction: f32, _occlusion: f32) -> RequestStatus {
        RequestStatus::Success
    }

    fn play_file(
        &mut self,
        _file_id: StandaloneFileId,
        _path: &str,
        _localized: bool,
    ) -> RequestStatus {
        RequestStatus::Success
    }

    fn stop_file(&mut self, _path: &str) -> RequestStatus {
        RequestStatus::Success
    }

    fn update(&mut self) {}
}

struct NullBackendListener;

impl BackendListener for NullBackendListener {
    fn set_transformation(&mut self, _transformation: &Transformation) {}

    fn update(&mut self) {}
}

impl Backend for NullBackend {
    fn init(
        &mut self,
        _object_pool_size: u32,
        _event_pool_size: u32,
        _reports: ReportSender,
    ) -> RequestStatus {
        RequestStatus::Success
    }

    fn shut_down(&mut self) {}

    fn release(&mut self) {}

    fn update(&mut self) {}

    fn on_refresh(&mut self) {}

    fn stop_all_sounds(&mut self) -> RequestStatus {
        RequestStatus::Success
    }

    fn set_language(&mut self, _language: &str) {}

    fn construct_object(&mut self, _name: &str) -> Box<dyn BackendObject> {
        Box::new(NullBackendObject)
    }

    fn construct_global_object(&mut self) -> Box<dyn BackendObject> {
        Box::new(NullBackendObject)
    }

    fn construct_listener(&mut self, _name: &str) -> Box<dyn BackendListener> {
        Box::new(NullBackendListener)
    }

    fn gamepad_connected(&mut self, _device_id: u64) {}

    fn gamepad_disconnected(&mut self, _device_id: u64) {}

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "null".to_string(),
            folder_name: "none".to_string(),
        }
    }

    fn file_data(&self, _name: &str) -> Option<FileData> {
        None
    }

    fn memory_info(&self) -> MemoryInfo {
        MemoryInfo::default()
    }
}
