//! # Ciclo de vida de pedidos
//!
//! ```text
//! NEW ──accept──> ACCEPTED ──ready──> READY ──deliver──> DELIVERED
//!  │                 │                  │
//!  ├──reject──> REJECTED                │
//!  └─────────────────┴──────cancel──────┴──> CANCELLED
//! ```
//!
//! El grafo vive en [`OrderStatus::apply`]. Cada transición se escribe con
//! compare-and-swap sobre el estado leído: si otra petición cambió el pedido
//! entre la lectura y la escritura, la operación falla con `Conflict` y el
//! llamador decide si vuelve a intentar.
//!
//! Tras una escritura correcta se emite un [`TransitionEvent`] a todos los
//! [`TransitionListener`] registrados (difusión en tiempo real, notificación
//! al cliente).

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::{AppError, AppResult};
use crate::db::{
    current_timestamp, NewOrder, Order, OrderAction, OrderStatus, OrderStore, ScheduleStore,
    StatusUpdate,
};
use crate::services::schedule;

/// Cambio de estado ya persistido
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub order_id: String,
    pub restaurant_id: String,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub order: Order,
}

#[async_trait]
pub trait TransitionListener: Send + Sync {
    async fn on_order_created(&self, _order: &Order) {}

    async fn on_transition(&self, event: &TransitionEvent);
}

/// Qué hacer con el código de confirmación al entregar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryCodePolicy {
    /// Nunca bloquea la entrega; un código distinto sólo se registra en el log
    #[default]
    Advisory,
    /// El código enviado debe coincidir con el guardado en el pedido
    Enforced,
}

impl FromStr for DeliveryCodePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "enforced" => Ok(Self::Enforced),
            other => Err(AppError::validation_field(
                "DELIVERY_CODE_POLICY",
                &format!("valor '{}' no soportado (advisory | enforced)", other),
            )),
        }
    }
}

pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    schedules: Arc<dyn ScheduleStore>,
    listeners: Vec<Arc<dyn TransitionListener>>,
    delivery_codes: DeliveryCodePolicy,
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn confirmation_code() -> String {
    format!("{:04}", uuid::Uuid::new_v4().as_u128() % 10_000)
}

impl OrderLifecycle {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        schedules: Arc<dyn ScheduleStore>,
        delivery_codes: DeliveryCodePolicy,
    ) -> Self {
        Self {
            orders,
            schedules,
            listeners: Vec::new(),
            delivery_codes,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn TransitionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Crea un pedido en estado `NEW`.
    ///
    /// `now` es la hora local del restaurante; un restaurante cerrado rechaza
    /// pedidos nuevos. Emite `on_order_created` a los listeners.
    pub async fn place_order(&self, new_order: NewOrder, now: NaiveDateTime) -> AppResult<Order> {
        if new_order.restaurant_id.trim().is_empty() {
            return Err(AppError::validation_field("restaurantId", "es requerido"));
        }
        if new_order.customer_id.trim().is_empty() {
            return Err(AppError::validation_field("customerId", "es requerido"));
        }
        if new_order.items.is_empty() {
            return Err(AppError::validation_field("items", "el pedido no tiene productos"));
        }

        let mut total_cents: i64 = 0;
        for item in &new_order.items {
            if item.quantity == 0 {
                return Err(AppError::validation_field(
                    "quantity",
                    &format!("'{}' debe tener cantidad mayor a 0", item.name),
                ));
            }
            if item.name.trim().is_empty() {
                return Err(AppError::validation_field("name", "cada producto necesita nombre"));
            }
            if item.unit_price_cents < 0 {
                return Err(AppError::validation_field("unitPriceCents", "no puede ser negativo"));
            }
            total_cents = item
                .subtotal_cents()
                .and_then(|subtotal| total_cents.checked_add(subtotal))
                .ok_or_else(|| AppError::validation_field("items", "total fuera de rango"))?;
        }

        let hours = self
            .schedules
            .find_schedule(&new_order.restaurant_id)
            .await?
            .unwrap_or_default();
        let status = schedule::get_status(&hours, now);
        if !status.is_open {
            tracing::info!(
                restaurant_id = %new_order.restaurant_id,
                message = %status.message,
                "Order rejected: restaurant closed"
            );
            return Err(AppError::Validation(format!(
                "El restaurante no acepta pedidos: {}",
                status.message
            )));
        }

        let created_at = current_timestamp();
        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            restaurant_id: new_order.restaurant_id,
            customer_id: new_order.customer_id,
            items: new_order.items,
            total_cents,
            status: OrderStatus::New,
            created_at,
            updated_at: created_at,
            rejection_reason: None,
            cancellation_reason: None,
            confirmation_code: Some(confirmation_code()),
        };

        self.orders.insert_order(&order).await?;
        tracing::info!(
            order_id = %order.id,
            restaurant_id = %order.restaurant_id,
            total_cents = order.total_cents,
            "Order placed"
        );

        for listener in &self.listeners {
            listener.on_order_created(&order).await;
        }
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &str) -> AppResult<Order> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found_id("Pedido", order_id))
    }

    pub async fn list_orders(
        &self,
        restaurant_id: &str,
        status: Option<OrderStatus>,
    ) -> AppResult<Vec<Order>> {
        self.orders.list_orders(restaurant_id, status).await
    }

    pub async fn accept(&self, order_id: &str) -> AppResult<Order> {
        self.transition(order_id, OrderAction::Accept).await
    }

    pub async fn reject(&self, order_id: &str, reason: Option<String>) -> AppResult<Order> {
        self.transition(order_id, OrderAction::Reject { reason }).await
    }

    pub async fn mark_ready(&self, order_id: &str) -> AppResult<Order> {
        self.transition(order_id, OrderAction::MarkReady).await
    }

    pub async fn mark_delivered(
        &self,
        order_id: &str,
        confirmation_code: Option<String>,
    ) -> AppResult<Order> {
        self.transition(order_id, OrderAction::MarkDelivered { confirmation_code })
            .await
    }

    pub async fn cancel(&self, order_id: &str, reason: Option<String>) -> AppResult<Order> {
        self.transition(order_id, OrderAction::Cancel { reason }).await
    }

    fn check_confirmation(&self, order: &Order, supplied: Option<&str>) -> AppResult<()> {
        let Some(expected) = order.confirmation_code.as_deref() else {
            return Ok(());
        };
        if supplied.map(str::trim) == Some(expected) {
            return Ok(());
        }
        match self.delivery_codes {
            DeliveryCodePolicy::Enforced => Err(AppError::ConfirmationMismatch {
                order_id: order.id.clone(),
            }),
            DeliveryCodePolicy::Advisory => {
                tracing::warn!(
                    order_id = %order.id,
                    code_supplied = supplied.is_some(),
                    "Delivered without matching confirmation code"
                );
                Ok(())
            }
        }
    }

    /// Lee, valida y escribe condicionalmente una transición.
    pub async fn transition(&self, order_id: &str, action: OrderAction) -> AppResult<Order> {
        let mut order = self.get_order(order_id).await?;
        let from = order.status;
        let to = from.apply(&action)?;

        let mut update = StatusUpdate {
            status: to,
            rejection_reason: None,
            cancellation_reason: None,
            updated_at: current_timestamp(),
        };
        match action {
            OrderAction::Reject { reason } => update.rejection_reason = non_empty(reason),
            OrderAction::Cancel { reason } => update.cancellation_reason = non_empty(reason),
            OrderAction::MarkDelivered { confirmation_code } => {
                self.check_confirmation(&order, confirmation_code.as_deref())?
            }
            OrderAction::Accept | OrderAction::MarkReady => {}
        }

        let written = self.orders.update_status_if(order_id, from, &update).await?;
        if !written {
            tracing::info!(order_id = %order_id, from = %from, to = %to, "Lost status race");
            return Err(AppError::Conflict(format!(
                "El pedido '{}' cambió de estado mientras se procesaba; vuelva a cargarlo",
                order_id
            )));
        }

        update.apply_to(&mut order);
        tracing::info!(order_id = %order_id, from = %from, to = %to, "Order transitioned");

        let event = TransitionEvent {
            order_id: order.id.clone(),
            restaurant_id: order.restaurant_id.clone(),
            from_status: from,
            to_status: to,
            order: order.clone(),
        };
        for listener in &self.listeners {
            listener.on_transition(&event).await;
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_policy_parses_config_values() {
        assert_eq!("Enforced".parse::<DeliveryCodePolicy>().unwrap(), DeliveryCodePolicy::Enforced);
        assert_eq!(
            " advisory ".parse::<DeliveryCodePolicy>().unwrap(),
            DeliveryCodePolicy::Advisory
        );
        assert!("strict".parse::<DeliveryCodePolicy>().is_err());
    }

    #[test]
    fn confirmation_codes_are_four_digits() {
        for _ in 0..50 {
            let code = confirmation_code();
            assert_eq!(code.len(), 4);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn blank_reasons_are_dropped() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" sin stock ".to_string())).as_deref(), Some("sin stock"));
    }
}
