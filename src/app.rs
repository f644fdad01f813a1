//! Cableado de almacenes y servicios compartido por el servidor y las pruebas.

use std::sync::Arc;

use crate::api::AppResult;
use crate::config::{AppConfig, StorageBackend};
use crate::db::{
    DeviceTokenStore, MemoryStore, MongoRepo, NotificationLog, OrderStore, ScheduleStore,
};
use crate::services::{
    CustomerNotifier, LogPushGateway, NotificationDispatcher, OrderLifecycle, PushGateway,
    RealtimeHub,
};

/// Estado compartido por todos los handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub lifecycle: Arc<OrderLifecycle>,
    pub dispatcher: NotificationDispatcher,
    pub realtime: RealtimeHub,
    pub schedules: Arc<dyn ScheduleStore>,
}

/// Almacenes detrás de los contratos de persistencia
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub devices: Arc<dyn DeviceTokenStore>,
    pub notifications: Arc<dyn NotificationLog>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            orders: store.clone(),
            schedules: store.clone(),
            devices: store.clone(),
            notifications: store,
        }
    }

    pub fn mongo(repo: MongoRepo) -> Self {
        let repo = Arc::new(repo);
        Self {
            orders: repo.clone(),
            schedules: repo.clone(),
            devices: repo.clone(),
            notifications: repo,
        }
    }

    /// Abre el backend configurado
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        match config.storage {
            StorageBackend::Memory => {
                tracing::warn!(
                    "Usando almacenamiento en memoria: los datos se pierden al reiniciar"
                );
                Ok(Self::memory())
            }
            StorageBackend::MongoDb => {
                let repo = MongoRepo::init(config).await?;
                // Sin índices las consultas siguen funcionando
                if let Err(e) = repo.create_indexes().await {
                    tracing::warn!("Advertencia creando índices: {}", e);
                }
                Ok(Self::mongo(repo))
            }
        }
    }
}

impl AppState {
    pub fn build(config: AppConfig, stores: Stores, gateway: Arc<dyn PushGateway>) -> Self {
        let realtime = RealtimeHub::new();
        let dispatcher = NotificationDispatcher::new(stores.devices, stores.notifications, gateway);

        let lifecycle =
            OrderLifecycle::new(stores.orders, stores.schedules.clone(), config.delivery_codes)
                .with_listener(Arc::new(realtime.clone()))
                .with_listener(Arc::new(CustomerNotifier::new(dispatcher.clone())));

        Self {
            config,
            lifecycle: Arc::new(lifecycle),
            dispatcher,
            realtime,
            schedules: stores.schedules,
        }
    }

    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let stores = Stores::open(&config).await?;
        Ok(Self::build(config, stores, Arc::new(LogPushGateway)))
    }
}
