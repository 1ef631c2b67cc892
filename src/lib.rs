pub mod backend;
pub mod config;
pub mod controls;
pub mod engine;
pub mod error;
pub mod event;
pub mod listener;
pub mod math;
pub mod notify;
pub mod object;
pub mod pool;
pub mod request;
pub mod services;

pub use backend::{
    Backend, BackendInfo, BackendListener, BackendObject, FileData, MemoryInfo, NullBackend,
    ReportSender,
};
pub use config::CadenzaDesc;
pub use controls::{
    ControlId, ControlRegistry, DataScope, Environment, Parameter, PreloadRequestId, Switch,
    SwitchState, SwitchStateId, Trigger, TriggerAction, string_to_id,
};
pub use engine::CadenzaEngine;
pub use error::CadenzaError;
pub use event::{
    AudioEvent, EventId, EventState, StandaloneFile, StandaloneFileId, StandaloneFileState,
};
pub use listener::{AudioListener, ListenerId, ListenerManager};
pub use math::Transformation;
pub use notify::{Notification, NotificationCallback, ObserverRegistry, SystemEvents};
pub use object::{AudioObject, ObjectFlags, ObjectId, OcclusionType, RayInfo};
pub use pool::{Handle, Pool};
pub use request::{
    CallbackRequest, ListenerRequest, ManagerRequest, ObjectRequest, Request, RequestData,
    RequestFlags, RequestResult, RequestStatus, Response,
};
pub use services::{AreaInfo, AreaQuery, ControlDataSource, PreloadCache};
