// Application state module
// Wires the shared stores and the request pipeline from the loaded configuration

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use super::persist::ConfigStore;
use super::types::Config;
use crate::handler::{AccessRecorder, PathResolver, RequestPipeline};
use crate::http::mime::ContentTypeResolver;
use crate::http::response::ErrorPage;
use crate::security::{SecurityPersistence, SecuritySnapshot, SecurityStore};

/// Application state
pub struct AppState {
    /// Configuration as loaded at startup
    pub config: Config,
    pub security: Arc<SecurityStore>,
    pub access: Arc<AccessRecorder>,
    pub config_store: Arc<ConfigStore>,
    pub pipeline: Arc<RequestPipeline>,
}

impl AppState {
    /// Build the state for `config`, persisting security changes to `config_path`
    pub fn new(config: Config, config_path: impl Into<PathBuf>) -> io::Result<Self> {
        let config_store = Arc::new(ConfigStore::new(config_path, config.clone()));
        let persistence: Arc<dyn SecurityPersistence> = config_store.clone();

        let security = Arc::new(
            SecurityStore::new(SecuritySnapshot::from_settings(&config.security))
                .with_persistence(persistence),
        );
        let access = Arc::new(AccessRecorder::new());

        let resolver = PathResolver::new(&config.files.document_root, &config.files.index_file)?;
        let error_page = ErrorPage::new(resolver.root(), &config.files.error_file);
        let pipeline = Arc::new(RequestPipeline::new(
            Arc::clone(&security),
            resolver,
            ContentTypeResolver::default(),
            error_page,
            Arc::clone(&access),
        ));

        Ok(Self {
            config,
            security,
            access,
            config_store,
            pipeline,
        })
    }
}
