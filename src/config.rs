/// Startup configuration for the engine.
///
/// Pool sizes are fixed for the lifetime of the engine; the backend is told
/// about them during [`crate::backend::Backend::init`] so it can mirror the
/// bounds on its side.
#[derive(Debug, Clone)]
pub struct CadenzaDesc {
    /// Capacity of the audio object pool.
    pub object_pool_size: u32,
    /// Capacity of the audio event pool.
    pub event_pool_size: u32,
    /// Capacity of the standalone file pool.
    pub standalone_file_pool_size: u32,
    /// Language forwarded to the backend and used for localized file lookups.
    pub language: String,
    /// Root folder of the audio control data on disk. The per-backend config
    /// path is derived from this plus the backend's folder name.
    pub data_root: String,
}

impl Default for CadenzaDesc {
    fn default() -> Self {
        Self {
            object_pool_size: 256,
            event_pool_size: 256,
            standalone_file_pool_size: 1,
            language: "english".to_string(),
            data_root: "audio".to_string(),
        }
    }
}
