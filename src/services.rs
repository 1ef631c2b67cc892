//! Contracts for the engine's external collaborators.
//!
//! These are I/O- or presentation-bound utilities that live outside the
//! engine: the control-data loader, the preload file cache, and the spatial
//! area query service. The engine ships no-op implementations so it is fully
//! functional before any collaborator is wired in.

use crate::controls::{ControlId, ControlRegistry, DataScope, PreloadRequestId};
use crate::error::Result;
use crate::math::Vec3;
use crate::request::RequestStatus;

/// Upper bound on environments returned for one position.
pub const MAX_AREAS: usize = 10;

/// Parses control/preload definition files into the engine's tables.
pub trait ControlDataSource: Send {
    fn parse_controls(
        &self,
        path: &str,
        scope: DataScope,
        registry: &mut ControlRegistry,
    ) -> Result<()>;

    fn parse_preloads(&self, path: &str, scope: DataScope) -> Result<()>;
}

/// Persistent file-cache (preload) management.
pub trait PreloadCache: Send {
    fn try_load(
        &mut self,
        request_id: PreloadRequestId,
        blocking: bool,
        auto_only: bool,
    ) -> RequestStatus;

    fn try_unload(&mut self, request_id: PreloadRequestId) -> RequestStatus;

    fn unload_by_scope(&mut self, scope: DataScope) -> RequestStatus;

    /// Drops parsed preload definitions for the scope.
    fn clear(&mut self, scope: DataScope);

    /// Re-resolves localized cache entries after a language change.
    fn update_localized_entries(&mut self);
}

/// One environment blend contributed by an area at a queried position.
#[derive(Debug, Clone, Copy)]
pub struct AreaInfo {
    pub environment_id: ControlId,
    pub amount: f32,
    pub providing_entity: u64,
}

/// Spatial query service used to compute ambient environment blends.
pub trait AreaQuery: Send {
    /// Environments affecting `position`, at most [`MAX_AREAS`] entries.
    fn query_areas(&self, position: Vec3) -> Vec<AreaInfo>;
}

pub struct NullControlDataSource;

impl ControlDataSource for NullControlDataSource {
    fn parse_controls(
        &self,
        _path: &str,
        _scope: DataScope,
        _registry: &mut ControlRegistry,
    ) -> Result<()> {
        Ok(())
    }

    fn parse_preloads(&self, _path: &str, _scope: DataScope) -> Result<()> {
        Ok(())
    }
}

pub struct NullPreloadCache;

impl PreloadCache for NullPreloadCache {
    fn try_load(
        &mut self,
        _request_id: PreloadRequestId,
        _blocking: bool,
        _auto_only: bool,
    ) -> RequestStatus {
        RequestStatus::Success
    }

    fn try_unload(&mut self, _request_id: PreloadRequestId) -> RequestStatus {
        RequestStatus::Success
    }

    fn unload_by_scope(&mut self, _scope: DataScope) -> RequestStatus {
        RequestStatus::Success
    }

    fn clear(&mut self, _scope: DataScope) {}

    fn update_localized_entries(&mut self) {}
}

pub struct NullAreaQuery;

impl AreaQuery for NullAreaQuery {
    fn query_areas(&self, _position: Vec3) -> Vec<AreaInfo> {
        Vec::new()
    }
}
