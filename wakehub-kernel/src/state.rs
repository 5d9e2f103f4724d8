use crate::journal::Journal;
use crate::store::DeviceStore;
use crate::wol::WakeEngine;
use std::sync::Arc;

/// État partagé par tous les handlers Axum.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DeviceStore>,
    pub journal: Journal,
    pub engine: Arc<WakeEngine>,
}

impl AppState {
    pub fn new(store: DeviceStore, journal: Journal, engine: WakeEngine) -> Self {
        Self { store: Arc::new(store), journal, engine: Arc::new(engine) }
    }
}
