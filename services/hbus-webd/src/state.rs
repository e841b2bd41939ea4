//! Shared application state, grounded on the teacher's
//! `services/server/src/state.rs`: a `Clone`-able struct of `Arc`/lock-
//! wrapped registries, built once in `main` and handed to `build_router`.

use std::collections::HashMap;
use std::sync::Arc;

use hbus_core::ConversionRegistry;
use hbus_datalog::SqliteBackend;
use hbus_supervisor::ProcessSupervisor;
use hbus_ui_log::UiLogger;
use tokio::sync::RwLock;

use crate::web_api_object::WebApiObject;

/// A log line pushed to `/api/v1/admin` observers. Kept as a plain string
/// wrapper rather than a richer event enum since this service has only
/// one audience for its operator log, unlike the teacher's dashboard
/// event bus which fans the same buffer out to several widget kinds.
#[derive(Debug, Clone)]
pub struct LogLine(pub String);

#[derive(Default)]
struct ObjectRegistry {
    by_name: HashMap<String, Arc<WebApiObject>>,
    by_id: HashMap<u64, Arc<WebApiObject>>,
}

#[derive(Clone)]
pub struct AppState {
    objects: Arc<RwLock<ObjectRegistry>>,
    pub process: Arc<ProcessSupervisor>,
    pub conversions: Arc<ConversionRegistry>,
    pub index_page: Option<String>,
    pub pages: Arc<RwLock<HashMap<String, String>>>,
    pub logger: Arc<UiLogger<LogLine>>,
    /// Backend new `DataLogVariable`s are built against. Kept here rather
    /// than opened ad hoc per variable so every logged object in the
    /// process shares one sqlite connection and one flush queue per name.
    pub datalog: Arc<SqliteBackend>,
}

impl AppState {
    pub fn new(
        process: Arc<ProcessSupervisor>,
        conversions: Arc<ConversionRegistry>,
        index_page: Option<String>,
        datalog: Arc<SqliteBackend>,
    ) -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(4096);
        let logger = Arc::new(UiLogger::with_buffer(tx, LogLine, 500));
        AppState {
            objects: Arc::new(RwLock::new(ObjectRegistry::default())),
            process,
            conversions,
            index_page,
            pages: Arc::new(RwLock::new(HashMap::new())),
            logger,
            datalog,
        }
    }

    pub async fn register_object(&self, object: Arc<WebApiObject>) {
        let id = hbus_core::Writable::id(object.as_ref()).raw();
        let mut registry = self.objects.write().await;
        registry.by_id.insert(id, object.clone());
        registry.by_name.insert(object.name().to_owned(), object);
    }

    pub async fn register_page(&self, name: impl Into<String>, html: impl Into<String>) {
        self.pages.write().await.insert(name.into(), html.into());
    }

    pub async fn object_by_name(&self, name: &str) -> Option<Arc<WebApiObject>> {
        self.objects.read().await.by_name.get(name).cloned()
    }

    pub async fn object_by_id(&self, id: u64) -> Option<Arc<WebApiObject>> {
        self.objects.read().await.by_id.get(&id).cloned()
    }

    pub async fn page(&self, name: &str) -> Option<String> {
        self.pages.read().await.get(name).cloned()
    }
}
