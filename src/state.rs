use std::sync::Arc;

use crate::auth::AuthManager;
use crate::interface::InterfaceService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InterfaceService>,
    pub auth: Arc<AuthManager>,
}

impl AppState {
    pub fn new(service: Arc<InterfaceService>, auth: Arc<AuthManager>) -> Self {
        Self { service, auth }
    }
}
