//! Typed requests and the status taxonomy the dispatcher writes back.

use bitflags::bitflags;

use crate::backend::{Backend, BackendInfo, FileData};
use crate::controls::{ControlId, DataScope, PreloadRequestId, SwitchStateId};
use crate::event::{EventId, StandaloneFileId};
use crate::listener::ListenerId;
use crate::math::Transformation;
use crate::notify::{NotificationCallback, SystemEvents};
use crate::object::{ObjectId, OcclusionType, RayInfo};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RequestFlags: u32 {
        /// The caller wants synchronous completion confirmation; consumed by
        /// the external queuing layer and by blocking preload loads.
        const EXECUTE_BLOCKING = 1 << 0;
    }
}

/// Outcome of one handled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Not yet processed.
    None,
    Success,
    /// Succeeded, but the caller must force an implementation-side rebuild.
    SuccessNeedsRefresh,
    PartialSuccess,
    Failure,
    /// A control id lookup failed.
    FailureInvalidControlId,
    /// Unknown or unsupported subtype, or malformed payload.
    FailureInvalidRequest,
}

impl RequestStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RequestStatus::Success | RequestStatus::SuccessNeedsRefresh
        )
    }
}

/// Coarse observer-facing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResult {
    Success,
    Failure,
}

impl From<RequestStatus> for RequestResult {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Success => RequestResult::Success,
            RequestStatus::SuccessNeedsRefresh
            | RequestStatus::PartialSuccess
            | RequestStatus::Failure
            | RequestStatus::FailureInvalidControlId
            | RequestStatus::FailureInvalidRequest => RequestResult::Failure,
            RequestStatus::None => {
                log::error!("unprocessed request status cannot be converted to a result");
                RequestResult::Failure
            }
        }
    }
}

/// Global and configuration operations.
pub enum ManagerRequest {
    None,
    AddRequestListener {
        callback: NotificationCallback,
        owner_filter: Option<u64>,
        event_mask: SystemEvents,
    },
    RemoveRequestListener {
        callback: NotificationCallback,
        owner_filter: Option<u64>,
    },
    SetBackend {
        /// `None` selects the built-in null backend.
        backend: Option<Box<dyn Backend>>,
    },
    ReleaseBackend,
    RefreshSystem {
        level_name: Option<String>,
    },
    StopAllSounds,
    ParseControlsData {
        path: String,
        scope: DataScope,
    },
    ParsePreloadsData {
        path: String,
        scope: DataScope,
    },
    ClearControlsData {
        scope: DataScope,
    },
    ClearPreloadsData {
        scope: DataScope,
    },
    PreloadSingleRequest {
        preload_id: PreloadRequestId,
        auto_load_only: bool,
    },
    UnloadSingleRequest {
        preload_id: PreloadRequestId,
    },
    UnloadDataByScope {
        scope: DataScope,
    },
    ChangeLanguage {
        language: String,
    },
    ReleasePendingRays,
    GetFileData {
        name: String,
    },
    GetBackendInfo,
    /// Out-of-taxonomy tag from the decode layer.
    Unknown {
        subtype: u32,
    },
}

/// Backend-originated outcome reports.
pub enum CallbackRequest {
    None,
    ReportStartedEvent { event_id: EventId },
    ReportVirtualizedEvent { event_id: EventId },
    ReportPhysicalizedEvent { event_id: EventId },
    ReportFinishedEvent { event_id: EventId, success: bool },
    ReportFinishedTriggerInstance { trigger_id: ControlId },
    ReportStartedFile { file_id: StandaloneFileId, success: bool },
    ReportStoppedFile { file_id: StandaloneFileId },
    Unknown { subtype: u32 },
}

/// Per-object operations; an absent target addresses the global object.
pub enum ObjectRequest {
    None,
    LoadTrigger {
        trigger_id: ControlId,
    },
    UnloadTrigger {
        trigger_id: ControlId,
    },
    PlayFile {
        file: String,
        used_trigger_id: Option<ControlId>,
        localized: bool,
    },
    StopFile {
        file: String,
    },
    ExecuteTrigger {
        trigger_id: ControlId,
    },
    /// One-shot detached playback on a throwaway object.
    ExecuteTriggerEx {
        trigger_id: ControlId,
        name: String,
        transformation: Transformation,
        occlusion_type: OcclusionType,
        set_current_environments: bool,
    },
    StopTrigger {
        trigger_id: ControlId,
    },
    StopAllTriggers,
    SetTransformation {
        transformation: Transformation,
    },
    SetParameter {
        parameter_id: ControlId,
        value: f32,
    },
    SetSwitchState {
        switch_id: ControlId,
        state_id: SwitchStateId,
    },
    SetOcclusionType {
        occlusion_type: OcclusionType,
    },
    SetCurrentEnvironments {
        entity_to_ignore: Option<u64>,
    },
    SetEnvironment {
        environment_id: ControlId,
        amount: f32,
    },
    RegisterObject {
        name: String,
        transformation: Transformation,
        occlusion_type: OcclusionType,
        set_current_environments: bool,
    },
    ReleaseObject,
    ProcessPhysicsRay {
        ray: RayInfo,
    },
    SetName {
        name: String,
    },
    ToggleAbsoluteVelocityTracking {
        enabled: bool,
    },
    ToggleRelativeVelocityTracking {
        enabled: bool,
    },
    Unknown {
        subtype: u32,
    },
}

/// Listener operations.
pub enum ListenerRequest {
    None,
    RegisterListener { name: String },
    ReleaseListener { listener_id: ListenerId },
    SetTransformation {
        listener_id: ListenerId,
        transformation: Transformation,
    },
    SetName {
        listener_id: ListenerId,
        name: String,
    },
    Unknown { subtype: u32 },
}

/// The four request categories.
pub enum RequestData {
    Manager(ManagerRequest),
    Callback(CallbackRequest),
    Object(ObjectRequest),
    Listener(ListenerRequest),
}

impl From<ManagerRequest> for RequestData {
    fn from(data: ManagerRequest) -> Self {
        RequestData::Manager(data)
    }
}

impl From<CallbackRequest> for RequestData {
    fn from(data: CallbackRequest) -> Self {
        RequestData::Callback(data)
    }
}

impl From<ObjectRequest> for RequestData {
    fn from(data: ObjectRequest) -> Self {
        RequestData::Object(data)
    }
}

impl From<ListenerRequest> for RequestData {
    fn from(data: ListenerRequest) -> Self {
        RequestData::Listener(data)
    }
}

/// Data the dispatcher hands back for identity-returning operations.
#[derive(Debug, Clone)]
pub enum Response {
    Object(ObjectId),
    Listener(ListenerId),
    BackendInfo(BackendInfo),
    FileData(FileData),
}

/// One dispatchable request. Caller-owned; the dispatcher writes `status`
/// (and `response`, where applicable) during the dispatch call.
pub struct Request {
    pub data: RequestData,
    /// Target object for object requests; `None` addresses the global object.
    pub object: Option<ObjectId>,
    /// Opaque tokens passed through to notifications unmodified.
    pub owner: Option<u64>,
    pub user_data: Option<u64>,
    pub user_data_owner: Option<u64>,
    pub flags: RequestFlags,
    pub status: RequestStatus,
    pub response: Option<Response>,
}

impl Request {
    pub fn new(data: impl Into<RequestData>) -> Self {
        Self {
            data: data.into(),
            object: None,
            owner: None,
            user_data: None,
            user_data_owner: None,
            flags: RequestFlags::empty(),
            status: RequestStatus::None,
            response: None,
        }
    }

    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }

    pub fn with_owner(mut self, owner: u64) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = Some(user_data);
        self
    }

    pub fn with_user_data_owner(mut self, user_data_owner: u64) -> Self {
        self.user_data_owner = Some(user_data_owner);
        self
    }

    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags = flags;
        self
    }
}
