//! Almacén en memoria.
//!
//! Implementa los mismos contratos que [`MongoRepo`](super::MongoRepo) sobre
//! mapas protegidos por un único mutex, así la escritura condicional de estado
//! es atómica igual que un `update_one` filtrado.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::models::{
    DeviceRegistration, Notification, Order, OrderStatus, RestaurantSchedule, StatusUpdate,
};
use super::store::{DeviceTokenStore, NotificationLog, OrderStore, ScheduleStore};
use crate::api::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    orders: HashMap<String, Order>,
    schedules: HashMap<String, RestaurantSchedule>,
    devices: HashMap<String, DeviceRegistration>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.orders.contains_key(&order.id) {
            return Err(AppError::Conflict(format!("El pedido '{}' ya existe", order.id)));
        }
        tables.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn find_order(&self, order_id: &str) -> AppResult<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(order_id).cloned())
    }

    async fn update_status_if(
        &self,
        order_id: &str,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.orders.get_mut(order_id) {
            Some(order) if order.status == expected => {
                update.apply_to(order);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_orders(
        &self,
        restaurant_id: &str,
        status: Option<OrderStatus>,
    ) -> AppResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.restaurant_id == restaurant_id)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn find_schedule(&self, restaurant_id: &str) -> AppResult<Option<RestaurantSchedule>> {
        Ok(self.tables.lock().await.schedules.get(restaurant_id).cloned())
    }

    async fn save_schedule(
        &self,
        restaurant_id: &str,
        schedule: &RestaurantSchedule,
    ) -> AppResult<()> {
        self.tables
            .lock()
            .await
            .schedules
            .insert(restaurant_id.to_string(), schedule.clone());
        Ok(())
    }
}

#[async_trait]
impl DeviceTokenStore for MemoryStore {
    async fn register_token(&self, registration: &DeviceRegistration) -> AppResult<()> {
        self.tables
            .lock()
            .await
            .devices
            .insert(registration.user_id.clone(), registration.clone());
        Ok(())
    }

    async fn find_token(&self, user_id: &str) -> AppResult<Option<String>> {
        Ok(self
            .tables
            .lock()
            .await
            .devices
            .get(user_id)
            .map(|d| d.push_token.clone()))
    }
}

#[async_trait]
impl NotificationLog for MemoryStore {
    async fn record(&self, notification: &Notification) -> AppResult<()> {
        self.tables.lock().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn mark_read(
        &self,
        notification_id: &str,
        user_id: &str,
        read_at: i64,
    ) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let found = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id);
        match found {
            Some(notification) => {
                notification.read_at.get_or_insert(read_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
