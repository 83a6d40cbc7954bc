use organizer_core::repositories::MenuStore;
use organizer_core::services::{MutationGateway, Reconciler};
use organizer_security::JwtService;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState<S: MenuStore> {
    pub gateway: Arc<MutationGateway<S>>,
    pub reconciler: Arc<Reconciler<S>>,
    pub jwt: Arc<JwtService>,
}

// Manual impl: a derive would require `S: Clone`.
impl<S: MenuStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            reconciler: self.reconciler.clone(),
            jwt: self.jwt.clone(),
        }
    }
}
