use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};

use super::models::{
    current_timestamp, DeviceRegistration, Notification, Order, OrderStatus, RestaurantSchedule,
    StatusUpdate,
};
use super::store::{DeviceTokenStore, NotificationLog, OrderStore, ScheduleStore};
use crate::api::middleware::ErrorLogExt;
use crate::api::{AppError, AppResult};
use crate::config::AppConfig;
use crate::services::schedule::{format_closed_days, parse_closed_days};

pub type Result<T> = std::result::Result<T, AppError>;

/// Campos de horario guardados en la colección de restaurantes.
///
/// `closedDays` se guarda como enteros separados por comas (`"0,6"`).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct RestaurantScheduleDocument {
    restaurant_id: String,
    open_time: Option<String>,
    close_time: Option<String>,
    #[serde(default)]
    closed_days: Option<String>,
    updated_at: i64,
}

impl RestaurantScheduleDocument {
    fn into_schedule(self) -> Result<RestaurantSchedule> {
        let closed_days = match self.closed_days.as_deref() {
            Some(raw) => parse_closed_days(raw)?,
            None => Default::default(),
        };
        Ok(RestaurantSchedule {
            open_time: self.open_time,
            close_time: self.close_time,
            closed_days,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MongoRepo {
    pub client: Client,
    pub database: Database,
}

impl MongoRepo {
    pub async fn init(config: &AppConfig) -> Result<MongoRepo> {
        let client = Client::with_uri_str(&config.mongodb_uri)
            .await
            .map_err(|e| AppError::Internal(format!("Error conectando a MongoDB: {}", e)))?;

        let database = client.database(&config.mongodb_database);

        // Test connection
        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| AppError::Internal(format!("Error validando conexión MongoDB: {}", e)))?;

        tracing::info!(
            database = %config.mongodb_database,
            "Conexión a MongoDB establecida exitosamente"
        );

        Ok(MongoRepo { client, database })
    }

    pub fn orders(&self) -> Collection<Order> {
        self.database.collection("orders")
    }

    fn restaurants(&self) -> Collection<RestaurantScheduleDocument> {
        self.database.collection("restaurants")
    }

    pub fn devices(&self) -> Collection<DeviceRegistration> {
        self.database.collection("device_tokens")
    }

    pub fn notifications(&self) -> Collection<Notification> {
        self.database.collection("notifications")
    }

    // Método para crear índices si es necesario
    pub async fn create_indexes(&self) -> Result<()> {
        use mongodb::{options::IndexOptions, IndexModel};

        let order_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "restaurantId": 1, "status": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "createdAt": -1 })
                .build(),
        ];

        self.orders()
            .create_indexes(order_indexes)
            .await
            .map_err(|e| AppError::Internal(format!("Error creando índices pedidos: {}", e)))?;

        self.restaurants()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "restaurantId": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .map_err(|e| {
                AppError::Internal(format!("Error creando índices restaurantes: {}", e))
            })?;

        self.devices()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "userId": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .map_err(|e| {
                AppError::Internal(format!("Error creando índices dispositivos: {}", e))
            })?;

        let notification_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "userId": 1, "createdAt": -1 })
                .build(),
        ];

        self.notifications()
            .create_indexes(notification_indexes)
            .await
            .map_err(|e| {
                AppError::Internal(format!("Error creando índices notificaciones: {}", e))
            })?;

        tracing::info!("Índices MongoDB creados exitosamente");
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MongoRepo {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        self.orders()
            .insert_one(order)
            .await
            .log_error_context("inserting new order")
            .map_err(|e| AppError::database("insert_order", e))?;
        Ok(())
    }

    async fn find_order(&self, order_id: &str) -> AppResult<Option<Order>> {
        self.orders()
            .find_one(doc! { "id": order_id })
            .await
            .log_error_context("finding order")
            .map_err(|e| AppError::database("find_order", e))
    }

    async fn update_status_if(
        &self,
        order_id: &str,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> AppResult<bool> {
        let mut set = doc! {
            "status": update.status.as_str(),
            "updatedAt": update.updated_at,
        };
        if let Some(reason) = &update.rejection_reason {
            set.insert("rejectionReason", reason.as_str());
        }
        if let Some(reason) = &update.cancellation_reason {
            set.insert("cancellationReason", reason.as_str());
        }

        // El filtro por estado convierte la escritura en compare-and-swap
        let result = self
            .orders()
            .update_one(
                doc! { "id": order_id, "status": expected.as_str() },
                doc! { "$set": set },
            )
            .await
            .log_error_context("updating order status")
            .map_err(|e| AppError::database("update_order_status", e))?;

        Ok(result.matched_count == 1)
    }

    async fn list_orders(
        &self,
        restaurant_id: &str,
        status: Option<OrderStatus>,
    ) -> AppResult<Vec<Order>> {
        let mut filter = doc! { "restaurantId": restaurant_id };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let mut cursor = self
            .orders()
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await
            .log_error_context("listing restaurant orders")
            .map_err(|e| AppError::database("list_orders", e))?;

        let mut results = Vec::new();
        while cursor.advance().await.map_err(|e| AppError::database("iterate_orders", e))? {
            let order = cursor
                .deserialize_current()
                .map_err(|e| AppError::Internal(format!("Error deserializando pedido: {}", e)))?;
            results.push(order);
        }
        Ok(results)
    }
}

#[async_trait]
impl ScheduleStore for MongoRepo {
    async fn find_schedule(&self, restaurant_id: &str) -> AppResult<Option<RestaurantSchedule>> {
        let found = self
            .restaurants()
            .find_one(doc! { "restaurantId": restaurant_id })
            .await
            .log_error_context("finding restaurant schedule")
            .map_err(|e| AppError::database("find_schedule", e))?;

        found.map(RestaurantScheduleDocument::into_schedule).transpose()
    }

    async fn save_schedule(
        &self,
        restaurant_id: &str,
        schedule: &RestaurantSchedule,
    ) -> AppResult<()> {
        let closed_days = format_closed_days(&schedule.closed_days);
        self.restaurants()
            .update_one(
                doc! { "restaurantId": restaurant_id },
                doc! {
                    "$set": {
                        "openTime": schedule.open_time.as_deref(),
                        "closeTime": schedule.close_time.as_deref(),
                        "closedDays": closed_days,
                        "updatedAt": current_timestamp(),
                    }
                },
            )
            .upsert(true)
            .await
            .log_error_context("saving restaurant schedule")
            .map_err(|e| AppError::database("save_schedule", e))?;
        Ok(())
    }
}

#[async_trait]
impl DeviceTokenStore for MongoRepo {
    async fn register_token(&self, registration: &DeviceRegistration) -> AppResult<()> {
        self.devices()
            .update_one(
                doc! { "userId": registration.user_id.as_str() },
                doc! {
                    "$set": {
                        "pushToken": registration.push_token.as_str(),
                        "updatedAt": registration.updated_at,
                    }
                },
            )
            .upsert(true)
            .await
            .log_error_context("registering device token")
            .map_err(|e| AppError::database("register_token", e))?;
        Ok(())
    }

    async fn find_token(&self, user_id: &str) -> AppResult<Option<String>> {
        let found = self
            .devices()
            .find_one(doc! { "userId": user_id })
            .await
            .log_error_context("finding device token")
            .map_err(|e| AppError::database("find_token", e))?;
        Ok(found.map(|d| d.push_token))
    }
}

#[async_trait]
impl NotificationLog for MongoRepo {
    async fn record(&self, notification: &Notification) -> AppResult<()> {
        self.notifications()
            .insert_one(notification)
            .await
            .log_error_context("recording notification")
            .map_err(|e| AppError::database("record_notification", e))?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        let mut cursor = self
            .notifications()
            .find(doc! { "userId": user_id })
            .sort(doc! { "createdAt": -1 })
            .await
            .log_error_context("listing notifications")
            .map_err(|e| AppError::database("list_notifications", e))?;

        let mut results = Vec::new();
        while cursor.advance().await.map_err(|e| AppError::database("iterate_notifications", e))? {
            let notification = cursor
                .deserialize_current()
                .map_err(|e| {
                    AppError::Internal(format!("Error deserializando notificación: {}", e))
                })?;
            results.push(notification);
        }
        Ok(results)
    }

    async fn mark_read(
        &self,
        notification_id: &str,
        user_id: &str,
        read_at: i64,
    ) -> AppResult<bool> {
        let filter: Document = doc! { "id": notification_id, "userId": user_id };

        let mut unread = filter.clone();
        unread.insert("readAt", mongodb::bson::Bson::Null);
        let result = self
            .notifications()
            .update_one(unread, doc! { "$set": { "readAt": read_at } })
            .await
            .log_error_context("marking notification read")
            .map_err(|e| AppError::database("mark_read", e))?;

        if result.matched_count == 1 {
            return Ok(true);
        }

        // Ya leída: sigue contando como éxito si existe
        let existing = self
            .notifications()
            .find_one(filter)
            .await
            .map_err(|e| AppError::database("mark_read", e))?;
        Ok(existing.is_some())
    }
}
