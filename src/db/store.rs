//! Contratos de persistencia que consumen los servicios.
//!
//! Hay dos implementaciones: [`MongoRepo`](super::MongoRepo) para producción y
//! [`MemoryStore`](super::MemoryStore) para pruebas y despliegues sin base de datos.

use async_trait::async_trait;

use super::models::{
    DeviceRegistration, Notification, Order, OrderStatus, RestaurantSchedule, StatusUpdate,
};
use crate::api::AppResult;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> AppResult<()>;

    async fn find_order(&self, order_id: &str) -> AppResult<Option<Order>>;

    /// Escribe `update` sólo si el estado actual sigue siendo `expected`.
    ///
    /// Devuelve `false` si el pedido no existe o su estado cambió desde la lectura.
    async fn update_status_if(
        &self,
        order_id: &str,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> AppResult<bool>;

    /// Pedidos de un restaurante, más recientes primero
    async fn list_orders(
        &self,
        restaurant_id: &str,
        status: Option<OrderStatus>,
    ) -> AppResult<Vec<Order>>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn find_schedule(&self, restaurant_id: &str) -> AppResult<Option<RestaurantSchedule>>;

    async fn save_schedule(
        &self,
        restaurant_id: &str,
        schedule: &RestaurantSchedule,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    /// Registra el token del usuario; el último registro reemplaza al anterior
    async fn register_token(&self, registration: &DeviceRegistration) -> AppResult<()>;

    async fn find_token(&self, user_id: &str) -> AppResult<Option<String>>;
}

#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn record(&self, notification: &Notification) -> AppResult<()>;

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Notification>>;

    /// Marca como leída; `false` si no existe o pertenece a otro usuario
    async fn mark_read(
        &self,
        notification_id: &str,
        user_id: &str,
        read_at: i64,
    ) -> AppResult<bool>;
}
