use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::GatewaySettings;
use crate::db::backend::SqlBackend;
use crate::gateway::connection::Gateway;
use crate::gateway::registry::RoomRegistry;
use crate::gateway::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub backend: Arc<SqlBackend>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    /// Wire a registry and gateway over the given pool. Each call yields an
    /// independent registry.
    pub fn new(db: SqlitePool, settings: GatewaySettings) -> Self {
        let backend = Arc::new(SqlBackend::new(db.clone()));
        let registry = Arc::new(RoomRegistry::new(
            Services::from_backend(backend.clone()),
            settings.max_message_len,
        ));
        let gateway = Arc::new(Gateway::new(backend.clone(), registry, settings));
        Self {
            db,
            backend,
            gateway,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        self.gateway.registry()
    }
}
