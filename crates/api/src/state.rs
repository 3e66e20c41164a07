use std::sync::Arc;

use traceam_sos::IncidentEngine;

use crate::auth::jwt::JwtKeys;
use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<IncidentEngine>,
    pub config: Arc<ServerConfig>,
    pub jwt: Arc<JwtKeys>,
}
