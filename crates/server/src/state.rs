use std::sync::Arc;

use vaidya_gateway::{
    AccountService, AdminService, ChatService, CommandService, CredentialService,
    DocumentPipeline, FeatureGate, MaintenanceController, ModelRouter, RateLimiter,
};
use vaidya_store::UserStore;

use crate::config::ServerConfig;

/// Shared application state handed to every handler.
///
/// The full object graph is built once at boot; handlers reach services
/// through cheap `Arc` clones and never construct collaborators themselves.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub users: Arc<dyn UserStore>,
    pub credentials: CredentialService,
    pub router: Arc<ModelRouter>,
    pub limiter: RateLimiter,
    pub gate: FeatureGate,
    pub maintenance: MaintenanceController,
    pub chat: ChatService,
    pub commands: CommandService,
    pub documents: DocumentPipeline,
    pub accounts: AccountService,
    pub admin: AdminService,
}
