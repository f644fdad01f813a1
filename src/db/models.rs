//! Modelos de dominio compartidos por los servicios y los almacenes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::api::{AppError, AppResult};

/// Timestamp unix actual en segundos
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Estado de un pedido.
///
/// Se serializa como `NEW`, `ACCEPTED`, ... tanto en JSON como en MongoDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Accepted,
    Ready,
    Delivered,
    Rejected,
    Cancelled,
}

/// Acción solicitada sobre un pedido existente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    Accept,
    Reject { reason: Option<String> },
    MarkReady,
    MarkDelivered { confirmation_code: Option<String> },
    Cancel { reason: Option<String> },
}

impl OrderAction {
    /// Verbo usado en mensajes de error y logs
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Accept => "aceptar",
            Self::Reject { .. } => "rechazar",
            Self::MarkReady => "marcar como listo",
            Self::MarkDelivered { .. } => "entregar",
            Self::Cancel { .. } => "cancelar",
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Accepted => "ACCEPTED",
            Self::Ready => "READY",
            Self::Delivered => "DELIVERED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Rejected | Self::Cancelled)
    }

    /// Grafo de transiciones del pedido.
    ///
    /// Devuelve el estado destino o `InvalidTransition` si la acción no está
    /// permitida desde `self`. Ningún estado terminal tiene salida.
    pub fn apply(self, action: &OrderAction) -> AppResult<OrderStatus> {
        let next = match (self, action) {
            (Self::New, OrderAction::Accept) => Self::Accepted,
            (Self::New, OrderAction::Reject { .. }) => Self::Rejected,
            (Self::Accepted, OrderAction::MarkReady) => Self::Ready,
            (Self::Ready, OrderAction::MarkDelivered { .. }) => Self::Delivered,
            (Self::New | Self::Accepted | Self::Ready, OrderAction::Cancel { .. }) => {
                Self::Cancelled
            }
            (from, action) => {
                return Err(AppError::InvalidTransition {
                    from,
                    action: action.verb(),
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "ACCEPTED" => Ok(Self::Accepted),
            "READY" => Ok(Self::Ready),
            "DELIVERED" => Ok(Self::Delivered),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(AppError::validation_field(
                "status",
                &format!("estado desconocido '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    /// Nombre del producto en el momento del pedido
    pub name: String,
    pub quantity: u32,
    /// Precio unitario en el momento del pedido
    pub unit_price_cents: i64,
}

impl OrderItem {
    /// `None` si el producto desborda `i64`
    pub fn subtotal_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub restaurant_id: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub created_at: i64, // timestamp unix
    pub updated_at: i64, // timestamp unix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_code: Option<String>,
}

/// Datos de un pedido nuevo antes de validar
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub restaurant_id: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
}

/// Escritura condicional de estado.
///
/// Los campos opcionales sólo se escriben si son `Some`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub updated_at: i64,
}

impl StatusUpdate {
    /// Aplica la escritura sobre una copia en memoria del pedido
    pub fn apply_to(&self, order: &mut Order) {
        order.status = self.status;
        order.updated_at = self.updated_at;
        if let Some(reason) = &self.rejection_reason {
            order.rejection_reason = Some(reason.clone());
        }
        if let Some(reason) = &self.cancellation_reason {
            order.cancellation_reason = Some(reason.clone());
        }
    }
}

/// Horario de un restaurante
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSchedule {
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    /// Días cerrados, 0 = domingo ... 6 = sábado
    #[serde(default)]
    pub closed_days: BTreeSet<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub user_id: String,
    pub push_token: String,
    pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    #[serde(default)]
    pub read_at: Option<i64>,
}

/// Fallo individual dentro de un envío masivo
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchFailure {
    pub user_id: String,
    pub reason: String,
}

/// Resultado agregado de un envío masivo
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub failures: Vec<DispatchFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_detects_overflow() {
        let mut item = OrderItem {
            product_id: "p1".to_string(),
            name: "Empanada".to_string(),
            quantity: 3,
            unit_price_cents: 250,
        };
        assert_eq!(item.subtotal_cents(), Some(750));

        item.unit_price_cents = i64::MAX / 2;
        assert_eq!(item.subtotal_cents(), None);
    }

    #[test]
    fn happy_path_transitions() {
        let accepted = OrderStatus::New.apply(&OrderAction::Accept).unwrap();
        let ready = accepted.apply(&OrderAction::MarkReady).unwrap();
        let delivered = ready
            .apply(&OrderAction::MarkDelivered { confirmation_code: None })
            .unwrap();
        assert_eq!(delivered, OrderStatus::Delivered);
    }

    #[test]
    fn cancel_allowed_until_delivery() {
        for from in [OrderStatus::New, OrderStatus::Accepted, OrderStatus::Ready] {
            let next = from.apply(&OrderAction::Cancel { reason: None }).unwrap();
            assert_eq!(next, OrderStatus::Cancelled);
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let actions = [
            OrderAction::Accept,
            OrderAction::Reject { reason: None },
            OrderAction::MarkReady,
            OrderAction::MarkDelivered { confirmation_code: None },
            OrderAction::Cancel { reason: None },
        ];
        for from in [OrderStatus::Delivered, OrderStatus::Rejected, OrderStatus::Cancelled] {
            assert!(from.is_terminal());
            for action in &actions {
                assert!(matches!(
                    from.apply(action),
                    Err(AppError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn new_cannot_skip_to_delivered() {
        let err = OrderStatus::New
            .apply(&OrderAction::MarkDelivered { confirmation_code: None })
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition { from: OrderStatus::New, action: "entregar" }
        ));
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!("ready".parse::<OrderStatus>().unwrap(), OrderStatus::Ready);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        assert!("PAID".parse::<OrderStatus>().is_err());
    }
}
