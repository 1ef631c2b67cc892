//! The request dispatcher and backend lifecycle manager.
//!
//! `CadenzaEngine` sits between the application thread and the active
//! backend. It receives discrete typed requests through
//! [`CadenzaEngine::process_request`], routes each to exactly one handler,
//! mutates the pooled object/event entities accordingly and reports the
//! outcome to registered observers. A periodic
//! [`CadenzaEngine::update`] advances time-based state and forwards to the
//! backend.
//!
//! # Architecture
//!
//! - **Control thread**: owns the engine; `process_request` and `update` must
//!   be called from it exclusively.
//! - **Backend threads**: may run internal workers, but hand their outcome
//!   reports back through the report channel; the engine drains the channel
//!   at the start of every tick, so all state mutation happens on the
//!   control thread.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::backend::{Backend, BackendInfo, MemoryInfo, NullBackend};
use crate::config::CadenzaDesc;
use crate::controls::{
    ABSOLUTE_VELOCITY_PARAMETER_ID, ControlId, ControlRegistry, DataScope,
    GLOBAL_PRELOAD_REQUEST_ID, RELATIVE_VELOCITY_PARAMETER_ID, Trigger, string_to_id,
};
use crate::error::Result;
use crate::event::{
    AudioEvent, EventState, StandaloneFile, StandaloneFileState, TriggerInstanceId,
};
use crate::listener::ListenerManager;
use crate::notify::{Notification, ObserverRegistry, SystemEvents};
use crate::object::{
    self, AudioObject, ObjectFlags, ObjectId, TriggerInstanceState, resolve_target,
};
use crate::pool::Pool;
use crate::request::{
    CallbackRequest, ListenerRequest, ManagerRequest, ObjectRequest, Request, RequestData,
    RequestFlags, RequestResult, RequestStatus, Response,
};
use crate::services::{
    AreaQuery, ControlDataSource, MAX_AREAS, NullAreaQuery, NullControlDataSource,
    NullPreloadCache, PreloadCache,
};

/// The typed command-dispatch and lifecycle-management engine.
pub struct CadenzaEngine {
    desc: CadenzaDesc,
    backend: Option<Box<dyn Backend>>,
    backend_info: BackendInfo,
    config_path: String,
    global_object: AudioObject,
    objects: Pool<AudioObject>,
    events: Pool<AudioEvent>,
    files: Pool<StandaloneFile>,
    listeners: ListenerManager,
    observers: ObserverRegistry,
    controls: ControlRegistry,
    control_source: Box<dyn ControlDataSource>,
    preloads: Box<dyn PreloadCache>,
    areas: Box<dyn AreaQuery>,
    report_tx: Sender<Request>,
    report_rx: Receiver<Request>,
    next_trigger_instance: TriggerInstanceId,
    shutting_down: bool,
}

impl CadenzaEngine {
    pub fn new(desc: CadenzaDesc) -> Result<Self> {
        let (report_tx, report_rx) = unbounded();

        let objects = Pool::new(desc.object_pool_size as usize);
        let events = Pool::new(desc.event_pool_size as usize);
        let files = Pool::new(desc.standalone_file_pool_size as usize);

        Ok(Self {
            desc,
            backend: None,
            backend_info: BackendInfo::default(),
            config_path: String::new(),
            global_object: AudioObject::new("global"),
            objects,
            events,
            files,
            listeners: ListenerManager::new(),
            observers: ObserverRegistry::new(),
            controls: ControlRegistry::new(),
            control_source: Box::new(NullControlDataSource),
            preloads: Box::new(NullPreloadCache),
            areas: Box::new(NullAreaQuery),
            report_tx,
            report_rx,
            next_trigger_instance: 1,
            shutting_down: false,
        })
    }

    /// Wires in the control-data loader collaborator.
    pub fn set_control_source(&mut self, source: Box<dyn ControlDataSource>) {
        self.control_source = source;
    }

    /// Wires in the preload/file-cache collaborator.
    pub fn set_preload_cache(&mut self, cache: Box<dyn PreloadCache>) {
        self.preloads = cache;
    }

    /// Wires in the spatial area-query collaborator.
    pub fn set_area_query(&mut self, areas: Box<dyn AreaQuery>) {
        self.areas = areas;
    }

    /// Channel endpoint for feeding requests from other threads (backend
    /// reports, physics ray results); drained at the start of every tick.
    pub fn report_sender(&self) -> Sender<Request> {
        self.report_tx.clone()
    }

    /// Synchronous dispatch entry point.
    ///
    /// Routes the request to exactly one handler, writes the resulting
    /// status onto the request, then informs every registered observer of
    /// the outcome, even on failure.
    pub fn process_request(&mut self, request: &mut Request) {
        if self.shutting_down {
            log::warn!("rejecting request while the backend is shutting down");
            request.status = RequestStatus::Failure;
            self.notify_observers(request);
            return;
        }

        let status = match &request.data {
            RequestData::Manager(_) => self.process_manager_request(request),
            RequestData::Callback(_) => self.process_callback_request(request),
            RequestData::Object(_) => self.process_object_request(request),
            RequestData::Listener(_) => self.process_listener_request(request),
        };

        request.status = status;
        self.notify_observers(request);
    }

    /// Advances listeners, the global object, pooled objects and the backend
    /// by one tick, after draining backend reports back into the dispatcher.
    pub fn update(&mut self, delta_time: f32) {
        while let Ok(mut request) = self.report_rx.try_recv() {
            self.process_request(&mut request);
        }

        if let Some(backend) = self.backend.as_mut() {
            self.listeners.update(delta_time);
            let listener_position = self.listeners.active_position();

            self.global_object.update(delta_time, listener_position);
            for (_, object) in self.objects.iter_mut() {
                object.update(delta_time, listener_position);
            }
            object::reclaim(&mut self.objects);

            backend.update();
        }
    }

    /// Swaps the active backend, per the hot-swap protocol.
    ///
    /// `None` (or a backend that fails to initialize) leaves the engine
    /// running on the built-in null backend. On init failure, the original
    /// failure status is returned even though the system is left in a
    /// working, null-backed state: a non-success status means "degraded",
    /// not "still the old backend".
    pub fn set_backend(&mut self, backend: Option<Box<dyn Backend>>) -> RequestStatus {
        if self.backend.is_some() {
            self.release_backend();
        }

        let mut adopted = match backend {
            Some(backend) => backend,
            None => {
                log::warn!("no backend provided, running with the null backend");
                Box::new(NullBackend)
            }
        };

        let status = adopted.init(
            self.desc.object_pool_size,
            self.desc.event_pool_size,
            self.report_tx.clone(),
        );

        if status != RequestStatus::Success {
            // An implementation that fails to initialize cleans up after
            // itself; there is no shut_down call on this path.
            log::error!(
                "failed to initialize backend '{}', running with the null backend",
                adopted.info().name
            );
            adopted.release();

            adopted = Box::new(NullBackend);
            let _ = adopted.init(
                self.desc.object_pool_size,
                self.desc.event_pool_size,
                self.report_tx.clone(),
            );
        }

        self.backend_info = adopted.info();
        self.config_path = format!(
            "{}/{}/config/",
            self.desc.data_root, self.backend_info.folder_name
        );

        assert!(
            !self.global_object.is_bound(),
            "the global object must be unbound while the backend is swapped"
        );
        self.global_object.bind(adopted.construct_global_object());

        for (_, object) in self.objects.iter_mut() {
            object.rebind(adopted.as_mut());
        }
        self.listeners.rebind(adopted.as_mut());

        adopted.set_language(&self.desc.language);
        self.backend = Some(adopted);

        status
    }

    /// Tears the active backend down transactionally.
    ///
    /// Engine-side objects and listeners survive unbound so a following
    /// [`CadenzaEngine::set_backend`] can rebind them; events and standalone
    /// files do not outlive their backend.
    pub fn release_backend(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };

        self.shutting_down = true;

        // Backend-owned data goes away in fixed order: standalone files,
        // listeners, events, objects. Nothing may reference a freed entity.
        self.files.clear();
        self.listeners.release_backend_data();
        self.events.clear();
        for (_, object) in self.objects.iter_mut() {
            object.release_backend_data();
        }
        self.global_object.release_backend_data();

        self.preloads.unload_by_scope(DataScope::All);
        self.preloads.clear(DataScope::All);
        self.controls.clear(DataScope::All);

        backend.shut_down();
        backend.release();
        drop(backend);

        self.backend_info = BackendInfo::default();
        self.shutting_down = false;
    }

    /// Forwards a gamepad connection to the backend.
    pub fn on_gamepad_connected(&mut self, device_id: u64) {
        if let Some(backend) = self.backend.as_mut() {
            backend.gamepad_connected(device_id);
        }
    }

    /// Forwards a gamepad disconnection to the backend.
    pub fn on_gamepad_disconnected(&mut self, device_id: u64) {
        if let Some(backend) = self.backend.as_mut() {
            backend.gamepad_disconnected(device_id);
        }
    }

    fn process_manager_request(&mut self, request: &mut Request) -> RequestStatus {
        let blocking = request.flags.contains(RequestFlags::EXECUTE_BLOCKING);
        let RequestData::Manager(data) = &mut request.data else {
            return RequestStatus::FailureInvalidRequest;
        };

        match data {
            ManagerRequest::None => RequestStatus::Success,
            ManagerRequest::AddRequestListener {
                callback,
                owner_filter,
                event_mask,
            } => {
                if self
                    .observers
                    .add(callback.clone(), *owner_filter, *event_mask)
                {
                    RequestStatus::Success
                } else {
                    RequestStatus::Failure
                }
            }
            ManagerRequest::RemoveRequestListener {
                callback,
                owner_filter,
            } => {
                if self.observers.remove(callback, *owner_filter) {
                    RequestStatus::Success
                } else {
                    RequestStatus::Failure
                }
            }
            ManagerRequest::SetBackend { backend } => {
                let backend = backend.take();
                self.set_backend(backend)
            }
            ManagerRequest::ReleaseBackend => {
                self.release_backend();
                RequestStatus::Success
            }
            ManagerRequest::RefreshSystem { level_name } => {
                let level_name = level_name.clone();
                self.refresh(level_name.as_deref())
            }
            ManagerRequest::StopAllSounds => match self.backend.as_mut() {
                Some(backend) => backend.stop_all_sounds(),
                None => RequestStatus::Failure,
            },
            ManagerRequest::ParseControlsData { path, scope } => {
                match self
                    .control_source
                    .parse_controls(path, *scope, &mut self.controls)
                {
                    Ok(()) => RequestStatus::Success,
                    Err(error) => {
                        log::error!("failed to parse control data: {}", error);
                        RequestStatus::Failure
                    }
                }
            }
            ManagerRequest::ParsePreloadsData { path, scope } => {
                match self.control_source.parse_preloads(path, *scope) {
                    Ok(()) => RequestStatus::Success,
                    Err(error) => {
                        log::error!("failed to parse preload data: {}", error);
                        RequestStatus::Failure
                    }
                }
            }
            ManagerRequest::ClearControlsData { scope } => {
                self.controls.clear(*scope);
                RequestStatus::Success
            }
            ManagerRequest::ClearPreloadsData { scope } => {
                self.preloads.clear(*scope);
                RequestStatus::Success
            }
            ManagerRequest::PreloadSingleRequest {
                preload_id,
                auto_load_only,
            } => self.preloads.try_load(*preload_id, blocking, *auto_load_only),
            ManagerRequest::UnloadSingleRequest { preload_id } => {
                self.preloads.try_unload(*preload_id)
            }
            ManagerRequest::UnloadDataByScope { scope } => self.preloads.unload_by_scope(*scope),
            ManagerRequest::ChangeLanguage { language } => {
                self.desc.language = language.clone();
                if let Some(backend) = self.backend.as_mut() {
                    backend.set_language(language);
                }
                self.preloads.update_localized_entries();
                RequestStatus::Success
            }
            ManagerRequest::ReleasePendingRays => {
                self.global_object.clear_pending_rays();
                for (_, object) in self.objects.iter_mut() {
                    object.clear_pending_rays();
                }
                RequestStatus::Success
            }
            ManagerRequest::GetFileData { name } => {
                match self.backend.as_ref().and_then(|b| b.file_data(name)) {
                    Some(file_data) => {
                        request.response = Some(Response::FileData(file_data));
                        RequestStatus::Success
                    }
                    None => RequestStatus::Failure,
                }
            }
            ManagerRequest::GetBackendInfo => match self.backend.as_ref() {
                Some(backend) => {
                    request.response = Some(Response::BackendInfo(backend.info()));
                    RequestStatus::Success
                }
                None => RequestStatus::Failure,
            },
            ManagerRequest::Unknown { subtype } => {
                log::warn!("received an unknown manager request: {}", subtype);
                RequestStatus::FailureInvalidRequest
            }
        }
    }

    fn process_callback_request(&mut self, request: &mut Request) -> RequestStatus {
        let RequestData::Callback(data) = &mut request.data else {
            return RequestStatus::FailureInvalidRequest;
        };

        match data {
            CallbackRequest::None | CallbackRequest::ReportFinishedTriggerInstance { .. } => {
                RequestStatus::Success
            }
            CallbackRequest::ReportStartedEvent { event_id } => {
                let event_id = *event_id;
                let Some(event) = self.events.get_mut(event_id) else {
                    log::warn!("started report for a dead event {:?}", event_id);
                    return RequestStatus::Failure;
                };
                event.state = EventState::PlayingDelayed;
                let target = event.object;

                if let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                {
                    object.add_event(event_id);
                }
                RequestStatus::Success
            }
            CallbackRequest::ReportVirtualizedEvent { event_id } => {
                let event_id = *event_id;
                let Some(event) = self.events.get_mut(event_id) else {
                    log::warn!("virtualized report for a dead event {:?}", event_id);
                    return RequestStatus::Failure;
                };
                event.state = EventState::Virtual;
                let target = event.object;

                if let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                {
                    if !object.is_virtual() && object.refresh_virtual_state(&self.events) {
                        // Virtualized objects skip occlusion ray work until
                        // they become audible again.
                        object.clear_pending_rays();
                    }
                }
                RequestStatus::Success
            }
            CallbackRequest::ReportPhysicalizedEvent { event_id } => {
                let event_id = *event_id;
                let Some(event) = self.events.get_mut(event_id) else {
                    log::warn!("physicalized report for a dead event {:?}", event_id);
                    return RequestStatus::Failure;
                };
                event.state = EventState::Playing;
                let target = event.object;

                if let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                {
                    object.remove_flag(ObjectFlags::VIRTUAL);
                }
                RequestStatus::Success
            }
            CallbackRequest::ReportFinishedEvent { event_id, success } => {
                let event_id = *event_id;
                let success = *success;
                let Some(event) = self.events.release(event_id) else {
                    log::warn!("finished report for a dead event {:?}", event_id);
                    return RequestStatus::Failure;
                };
                log::debug!(
                    "event {:?} of trigger {} finished (success: {})",
                    event_id,
                    event.trigger_id,
                    success
                );

                let target = event.object;
                let mut finished_instance = None;
                if let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                {
                    object.remove_event(event_id, &self.events);
                    finished_instance = object.finish_trigger_event(event.trigger_instance_id);
                }

                if let Some(instance) = finished_instance {
                    let mut finished = Request::new(
                        CallbackRequest::ReportFinishedTriggerInstance {
                            trigger_id: instance.trigger_id,
                        },
                    );
                    finished.object = target;
                    finished.owner = instance.owner;
                    finished.user_data = instance.user_data;
                    finished.user_data_owner = instance.user_data_owner;
                    self.process_request(&mut finished);
                }
                RequestStatus::Success
            }
            CallbackRequest::ReportStartedFile { file_id, success } => {
                let file_id = *file_id;
                let success = *success;
                let Some(file) = self.files.get_mut(file_id) else {
                    log::warn!("started report for a dead standalone file {:?}", file_id);
                    return RequestStatus::Failure;
                };

                file.state = if success {
                    StandaloneFileState::Playing
                } else {
                    StandaloneFileState::None
                };

                let (owner, user_data, user_data_owner, target) =
                    (file.owner, file.user_data, file.user_data_owner, file.object);
                request.owner = owner;
                request.user_data = user_data;
                request.user_data_owner = user_data_owner;
                request.object = target;

                if success {
                    RequestStatus::Success
                } else {
                    RequestStatus::Failure
                }
            }
            CallbackRequest::ReportStoppedFile { file_id } => {
                let file_id = *file_id;
                let Some(file) = self.files.release(file_id) else {
                    log::warn!("stopped report for a dead standalone file {:?}", file_id);
                    return RequestStatus::Failure;
                };

                request.owner = file.owner;
                request.user_data = file.user_data;
                request.user_data_owner = file.user_data_owner;
                request.object = file.object;

                if let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, file.object)
                {
                    object.remove_file(file_id);
                }
                RequestStatus::Success
            }
            CallbackRequest::Unknown { subtype } => {
                log::warn!("received an unknown callback request: {}", subtype);
                RequestStatus::FailureInvalidRequest
            }
        }
    }

    fn process_object_request(&mut self, request: &mut Request) -> RequestStatus {
        let target = request.object;
        let owner = request.owner;
        let user_data = request.user_data;
        let user_data_owner = request.user_data_owner;
        let RequestData::Object(data) = &mut request.data else {
            return RequestStatus::FailureInvalidRequest;
        };

        match data {
            ObjectRequest::None => RequestStatus::Success,
            ObjectRequest::LoadTrigger { trigger_id } => {
                let Some(trigger) = self.controls.trigger(*trigger_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                match object.backend() {
                    Some(handle) => handle.load_trigger_async(trigger, true),
                    None => RequestStatus::Failure,
                }
            }
            ObjectRequest::UnloadTrigger { trigger_id } => {
                let Some(trigger) = self.controls.trigger(*trigger_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                match object.backend() {
                    Some(handle) => handle.load_trigger_async(trigger, false),
                    None => RequestStatus::Failure,
                }
            }
            ObjectRequest::PlayFile {
                file,
                used_trigger_id,
                localized,
            } => {
                if file.is_empty() {
                    return RequestStatus::Failure;
                }
                if let Some(trigger_id) = used_trigger_id {
                    if self.controls.trigger(*trigger_id).is_none() {
                        log::warn!(
                            "playback settings trigger {} not found for file '{}'",
                            trigger_id,
                            file
                        );
                    }
                }

                let path = file.clone();
                let localized = *localized;
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                if !object.is_bound() {
                    return RequestStatus::Failure;
                }

                let mut standalone = StandaloneFile::new(target, path.clone());
                standalone.owner = owner;
                standalone.user_data = user_data;
                standalone.user_data_owner = user_data_owner;
                let file_id = self.files.allocate(standalone);

                let status = match object.backend() {
                    Some(handle) => handle.play_file(file_id, &path, localized),
                    None => RequestStatus::Failure,
                };

                if status == RequestStatus::Success {
                    object.add_file(file_id);
                    RequestStatus::Success
                } else {
                    self.files.release(file_id);
                    RequestStatus::Failure
                }
            }
            ObjectRequest::StopFile { file } => {
                if file.is_empty() {
                    return RequestStatus::Failure;
                }
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                match object.backend() {
                    Some(handle) => handle.stop_file(file),
                    None => RequestStatus::Failure,
                }
            }
            ObjectRequest::ExecuteTrigger { trigger_id } => {
                let Some(trigger) = self.controls.trigger(*trigger_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                execute_trigger_on(
                    object,
                    target,
                    trigger,
                    &mut self.events,
                    &mut self.next_trigger_instance,
                    owner,
                    user_data,
                    user_data_owner,
                )
            }
            ObjectRequest::ExecuteTriggerEx {
                trigger_id,
                name,
                transformation,
                occlusion_type,
                set_current_environments,
            } => {
                let Some(trigger) = self.controls.trigger(*trigger_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                let Some(backend) = self.backend.as_mut() else {
                    return RequestStatus::Failure;
                };

                let mut one_shot = AudioObject::new(name);
                one_shot.bind(backend.construct_object(name));
                one_shot.set_transformation(*transformation);
                if *set_current_environments {
                    apply_current_environments(
                        &mut one_shot,
                        self.areas.as_ref(),
                        &self.controls,
                        None,
                    );
                }
                one_shot.set_occlusion_type(*occlusion_type);

                if self.objects.is_full() {
                    object::reclaim(&mut self.objects);
                }
                let new_id = self.objects.allocate(one_shot);
                let Some(object) = self.objects.get_mut(new_id) else {
                    return RequestStatus::Failure;
                };

                let status = execute_trigger_on(
                    object,
                    Some(new_id),
                    trigger,
                    &mut self.events,
                    &mut self.next_trigger_instance,
                    owner,
                    user_data,
                    user_data_owner,
                );
                // Detached one-shot: reclaimed as soon as its events finish.
                object.remove_flag(ObjectFlags::IN_USE);
                status
            }
            ObjectRequest::StopTrigger { trigger_id } => {
                let Some(trigger) = self.controls.trigger(*trigger_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                match object.backend() {
                    Some(handle) => handle.stop_trigger(trigger.id),
                    None => RequestStatus::Failure,
                }
            }
            ObjectRequest::StopAllTriggers => {
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                match object.backend() {
                    Some(handle) => handle.stop_all_triggers(),
                    None => RequestStatus::Failure,
                }
            }
            ObjectRequest::SetTransformation { transformation } => {
                if target.is_none() {
                    log::warn!("received a request to set a transformation on the global object");
                    return RequestStatus::Failure;
                }
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                object.set_transformation(*transformation)
            }
            ObjectRequest::SetParameter {
                parameter_id,
                value,
            } => {
                let Some(parameter) = self.controls.parameter(*parameter_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                match object.backend() {
                    Some(handle) => handle.set_parameter(parameter.id, *value),
                    None => RequestStatus::Failure,
                }
            }
            ObjectRequest::SetSwitchState {
                switch_id,
                state_id,
            } => {
                let Some(switch) = self.controls.switch(*switch_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                if !switch.states.contains_key(state_id) {
                    return RequestStatus::FailureInvalidControlId;
                }
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                match object.backend() {
                    Some(handle) => handle.set_switch_state(switch.id, *state_id),
                    None => RequestStatus::Failure,
                }
            }
            ObjectRequest::SetOcclusionType { occlusion_type } => {
                if target.is_none() {
                    log::warn!("received a request to set the occlusion type on the global object");
                    return RequestStatus::Failure;
                }
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                object.set_occlusion_type(*occlusion_type);
                RequestStatus::Success
            }
            ObjectRequest::SetCurrentEnvironments { entity_to_ignore } => {
                let entity_to_ignore = *entity_to_ignore;
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                apply_current_environments(
                    object,
                    self.areas.as_ref(),
                    &self.controls,
                    entity_to_ignore,
                );
                RequestStatus::Success
            }
            ObjectRequest::SetEnvironment {
                environment_id,
                amount,
            } => {
                if target.is_none() {
                    log::warn!("received a request to set an environment on the global object");
                    return RequestStatus::Failure;
                }
                let Some(environment) = self.controls.environment(*environment_id) else {
                    return RequestStatus::FailureInvalidControlId;
                };
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                object.set_environment(environment.id, *amount)
            }
            ObjectRequest::RegisterObject {
                name,
                transformation,
                occlusion_type,
                set_current_environments,
            } => {
                let Some(backend) = self.backend.as_mut() else {
                    log::error!("cannot register an audio object without an active backend");
                    return RequestStatus::Failure;
                };

                let mut object = AudioObject::new(name);
                object.bind(backend.construct_object(name));
                object.set_transformation(*transformation);
                if *set_current_environments {
                    apply_current_environments(
                        &mut object,
                        self.areas.as_ref(),
                        &self.controls,
                        None,
                    );
                }
                object.set_occlusion_type(*occlusion_type);

                if self.objects.is_full() {
                    object::reclaim(&mut self.objects);
                }
                let id = self.objects.allocate(object);
                request.response = Some(Response::Object(id));
                RequestStatus::Success
            }
            ObjectRequest::ReleaseObject => match target {
                None => {
                    log::warn!("received a request to release the global object");
                    RequestStatus::Failure
                }
                Some(id) => match self.objects.get_mut(id) {
                    Some(object) => {
                        object.remove_flag(ObjectFlags::IN_USE);
                        RequestStatus::Success
                    }
                    None => {
                        // Already reclaimed; releasing twice is a no-op.
                        log::debug!("release for an already reclaimed object {:?}", id);
                        RequestStatus::Success
                    }
                },
            },
            ObjectRequest::ProcessPhysicsRay { ray } => {
                let ray = *ray;
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                object.process_physics_ray(&ray);
                RequestStatus::Success
            }
            ObjectRequest::SetName { name } => {
                let name = name.clone();
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                let status = object.set_name(&name);
                if status == RequestStatus::SuccessNeedsRefresh {
                    let Some(backend) = self.backend.as_mut() else {
                        return RequestStatus::Failure;
                    };
                    object.rebind(backend.as_mut());
                    return RequestStatus::Success;
                }
                status
            }
            ObjectRequest::ToggleAbsoluteVelocityTracking { enabled } => {
                let enabled = *enabled;
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                if enabled {
                    object.set_flag(ObjectFlags::TRACK_ABSOLUTE_VELOCITY);
                } else {
                    object.remove_flag(ObjectFlags::TRACK_ABSOLUTE_VELOCITY);
                    object.reset_velocity_tracking(ABSOLUTE_VELOCITY_PARAMETER_ID);
                }
                RequestStatus::Success
            }
            ObjectRequest::ToggleRelativeVelocityTracking { enabled } => {
                let enabled = *enabled;
                let Some(object) =
                    resolve_target(&mut self.global_object, &mut self.objects, target)
                else {
                    return RequestStatus::Failure;
                };
                if enabled {
                    object.set_flag(ObjectFlags::TRACK_RELATIVE_VELOCITY);
                } else {
                    object.remove_flag(ObjectFlags::TRACK_RELATIVE_VELOCITY);
                    object.reset_velocity_tracking(RELATIVE_VELOCITY_PARAMETER_ID);
                }
                RequestStatus::Success
            }
            ObjectRequest::Unknown { subtype } => {
                log::warn!("received an unknown object request: {}", subtype);
                RequestStatus::FailureInvalidRequest
            }
        }
    }

    fn process_listener_request(&mut self, request: &mut Request) -> RequestStatus {
        let RequestData::Listener(data) = &mut request.data else {
            return RequestStatus::FailureInvalidRequest;
        };

        match data {
            ListenerRequest::None => RequestStatus::Success,
            ListenerRequest::RegisterListener { name } => {
                let id = self.listeners.create(name, self.backend.as_deref_mut());
                request.response = Some(Response::Listener(id));
                RequestStatus::Success
            }
            ListenerRequest::ReleaseListener { listener_id } => {
                if self.listeners.release(*listener_id) {
                    RequestStatus::Success
                } else {
                    log::warn!("release for an unknown listener {}", listener_id);
                    RequestStatus::Failure
                }
            }
            ListenerRequest::SetTransformation {
                listener_id,
                transformation,
            } => match self.listeners.get_mut(*listener_id) {
                Some(listener) => {
                    listener.set_transformation(*transformation);
                    RequestStatus::Success
                }
                None => {
                    log::warn!("transformation for an unknown listener {}", listener_id);
                    RequestStatus::Failure
                }
            },
            ListenerRequest::SetName { listener_id, name } => {
                match self.listeners.get_mut(*listener_id) {
                    Some(listener) => {
                        listener.set_name(name);
                        RequestStatus::Success
                    }
                    None => RequestStatus::Failure,
                }
            }
            ListenerRequest::Unknown { subtype } => {
                log::warn!("received an unknown listener request: {}", subtype);
                RequestStatus::FailureInvalidRequest
            }
        }
    }

    /// Refreshes the whole audio state for a (possibly new) level.
    fn refresh(&mut self, level_name: Option<&str>) -> RequestStatus {
        let Some(backend) = self.backend.as_mut() else {
            return RequestStatus::Failure;
        };
        log::warn!("beginning to refresh the audio system");

        backend.stop_all_sounds();
        self.preloads.unload_by_scope(DataScope::LevelSpecific);
        self.preloads.unload_by_scope(DataScope::Global);
        self.preloads.clear(DataScope::All);
        self.controls.clear(DataScope::All);
        backend.on_refresh();

        let config_path = self.config_path.clone();
        if let Err(error) =
            self.control_source
                .parse_controls(&config_path, DataScope::Global, &mut self.controls)
        {
            log::error!("failed to re-parse global control data: {}", error);
        }
        if let Err(error) = self
            .control_source
            .parse_preloads(&config_path, DataScope::Global)
        {
            log::error!("failed to re-parse global preload data: {}", error);
        }

        // The global preload might not exist if no preloads were authored;
        // the result of this load is deliberately unchecked.
        let _ = self.preloads.try_load(GLOBAL_PRELOAD_REQUEST_ID, true, true);

        if let Some(level) = level_name.filter(|name| !name.is_empty()) {
            let level_path = format!("{}levels/{}", config_path, level);
            if let Err(error) = self.control_source.parse_controls(
                &level_path,
                DataScope::LevelSpecific,
                &mut self.controls,
            ) {
                log::error!("failed to re-parse level control data: {}", error);
            }
            if let Err(error) = self
                .control_source
                .parse_preloads(&level_path, DataScope::LevelSpecific)
            {
                log::error!("failed to re-parse level preload data: {}", error);
            }

            let status = self.preloads.try_load(string_to_id(level), true, true);
            if status != RequestStatus::Success {
                log::warn!("no preload request found for level \"{}\"", level);
            }
        }

        log::warn!("done refreshing the audio system");
        RequestStatus::Success
    }

    /// Converts a completed request into one observer-facing notification.
    fn notify_observers(&self, request: &Request) {
        if self.observers.is_empty() {
            return;
        }

        let mut event = SystemEvents::empty();
        let mut control_id = None;
        let mut audio_event = None;
        let mut standalone_file = None;

        match &request.data {
            RequestData::Manager(data) => {
                if let ManagerRequest::SetBackend { .. } = data {
                    event = SystemEvents::IMPL_SET;
                }
            }
            RequestData::Callback(data) => match data {
                CallbackRequest::ReportFinishedTriggerInstance { trigger_id } => {
                    control_id = Some(*trigger_id);
                    event = SystemEvents::TRIGGER_FINISHED;
                }
                CallbackRequest::ReportStartedEvent { event_id } => {
                    audio_event = Some(*event_id);
                }
                CallbackRequest::ReportStartedFile { file_id, .. } => {
                    standalone_file = Some(*file_id);
                    event = SystemEvents::FILE_STARTED;
                }
                CallbackRequest::ReportStoppedFile { file_id } => {
                    standalone_file = Some(*file_id);
                    event = SystemEvents::FILE_STOPPED;
                }
                _ => {}
            },
            RequestData::Object(data) => match data {
                ObjectRequest::ExecuteTrigger { trigger_id } => {
                    control_id = Some(*trigger_id);
                    event = SystemEvents::TRIGGER_EXECUTED;
                }
                ObjectRequest::PlayFile { .. } => {
                    event = SystemEvents::FILE_PLAY;
                }
                _ => {}
            },
            RequestData::Listener(_) => {}
        }

        let notification = Notification {
            result: RequestResult::from(request.status),
            owner: request.owner,
            user_data: request.user_data,
            user_data_owner: request.user_data_owner,
            event,
            control_id,
            object: request.object,
            audio_event,
            standalone_file,
        };

        self.observers.notify(&notification);
    }

    // Debug/introspection getters; presentation-only.

    pub fn backend_info(&self) -> &BackendInfo {
        &self.backend_info
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn global_object_bound(&self) -> bool {
        self.global_object.is_bound()
    }

    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    pub fn objects_in_use(&self) -> usize {
        self.objects.len()
    }

    pub fn object_capacity(&self) -> usize {
        self.objects.capacity()
    }

    pub fn events_in_use(&self) -> usize {
        self.events.len()
    }

    pub fn files_in_use(&self) -> usize {
        self.files.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn object_flags(&self, id: ObjectId) -> Option<ObjectFlags> {
        self.objects.get(id).map(AudioObject::flags)
    }

    pub fn trigger_radius(&self, trigger_id: ControlId) -> Option<f32> {
        self.controls.trigger(trigger_id).map(|t| t.radius)
    }

    pub fn memory_info(&self) -> MemoryInfo {
        self.backend
            .as_ref()
            .map(|b| b.memory_info())
            .unwrap_or_default()
    }
}

impl Drop for CadenzaEngine {
    fn drop(&mut self) {
        self.release_backend();
    }
}

/// Executes every action of `trigger` on `object`, allocating one event per
/// started action and recording the trigger instance for completion
/// notification.
#[allow(clippy::too_many_arguments)]
fn execute_trigger_on(
    object: &mut AudioObject,
    target: Option<ObjectId>,
    trigger: &Trigger,
    events: &mut Pool<AudioEvent>,
    next_instance: &mut TriggerInstanceId,
    owner: Option<u64>,
    user_data: Option<u64>,
    user_data_owner: Option<u64>,
) -> RequestStatus {
    let instance_id = *next_instance;
    *next_instance += 1;

    let Some(handle) = object.backend() else {
        log::warn!(
            "cannot execute trigger '{}' on an unbound object",
            trigger.name
        );
        return RequestStatus::Failure;
    };

    let mut started = Vec::new();
    for action in &trigger.actions {
        let event_id = events.allocate(AudioEvent::new(target, trigger.id, instance_id));
        if handle.execute_trigger(trigger, action, event_id).is_success() {
            started.push(event_id);
        } else {
            log::warn!(
                "backend rejected action '{}' of trigger '{}'",
                action.key,
                trigger.name
            );
            events.release(event_id);
        }
    }

    if started.is_empty() {
        return RequestStatus::Failure;
    }

    for event_id in &started {
        object.add_event(*event_id);
    }
    object.add_trigger_instance(
        instance_id,
        TriggerInstanceState {
            trigger_id: trigger.id,
            owner,
            user_data,
            user_data_owner,
            pending_events: started.len() as u32,
        },
    );
    RequestStatus::Success
}

/// Applies the environment blends reported by the area-query service at the
/// object's position.
fn apply_current_environments(
    object: &mut AudioObject,
    areas: &dyn AreaQuery,
    controls: &ControlRegistry,
    entity_to_ignore: Option<u64>,
) {
    let position = object.transformation().position;
    let mut infos = areas.query_areas(position);
    infos.truncate(MAX_AREAS);

    for info in infos {
        if entity_to_ignore.is_some_and(|ignored| ignored == info.providing_entity) {
            continue;
        }
        if controls.environment(info.environment_id).is_some() {
            object.set_environment(info.environment_id, info.amount);
        }
    }
}
