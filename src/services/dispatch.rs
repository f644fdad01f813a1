//! # Envío de notificaciones
//!
//! Busca el token del dispositivo del usuario, entrega el mensaje al
//! [`PushGateway`] y registra la notificación. La entrega física es de mejor
//! esfuerzo: una vez que el token existe, un fallo del proveedor push no se
//! considera fallo del envío.
//!
//! El envío masivo lanza una tarea por destinatario y espera a todas; ningún
//! fallo individual cancela ni bloquea a las demás.

use async_trait::async_trait;
use std::sync::Arc;

use crate::api::{AppError, AppResult};
use crate::db::{
    current_timestamp, DeviceRegistration, DeviceTokenStore, DispatchFailure, DispatchResult,
    Notification, NotificationLog, OrderStatus,
};
use crate::services::lifecycle::{TransitionEvent, TransitionListener};

/// Proveedor de notificaciones push
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn push(&self, token: &str, title: &str, body: &str) -> AppResult<()>;
}

/// Gateway que sólo deja constancia del envío en el log
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn push(&self, token: &str, title: &str, body: &str) -> AppResult<()> {
        tracing::info!(token = %token, title = %title, body = %body, "Push notification sent");
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    devices: Arc<dyn DeviceTokenStore>,
    log: Arc<dyn NotificationLog>,
    gateway: Arc<dyn PushGateway>,
}

impl NotificationDispatcher {
    pub fn new(
        devices: Arc<dyn DeviceTokenStore>,
        log: Arc<dyn NotificationLog>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        Self { devices, log, gateway }
    }

    pub async fn register_device(
        &self,
        user_id: &str,
        push_token: &str,
    ) -> AppResult<DeviceRegistration> {
        if user_id.trim().is_empty() {
            return Err(AppError::validation_field("userId", "es requerido"));
        }
        if push_token.trim().is_empty() {
            return Err(AppError::validation_field("pushToken", "es requerido"));
        }

        let registration = DeviceRegistration {
            user_id: user_id.to_string(),
            push_token: push_token.trim().to_string(),
            updated_at: current_timestamp(),
        };
        self.devices.register_token(&registration).await?;
        tracing::debug!(user_id = %user_id, "Device token registered");
        Ok(registration)
    }

    /// Envía una notificación a un usuario.
    ///
    /// Falla con `NoDeviceToken` si el usuario no tiene dispositivo.
    pub async fn send(&self, user_id: &str, title: &str, body: &str) -> AppResult<Notification> {
        let token = self
            .devices
            .find_token(user_id)
            .await?
            .ok_or_else(|| AppError::NoDeviceToken(user_id.to_string()))?;

        if let Err(e) = self.gateway.push(&token, title, body).await {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Push provider failed, notification still recorded"
            );
        }

        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: current_timestamp(),
            read_at: None,
        };
        self.log.record(&notification).await?;
        Ok(notification)
    }

    /// Envío masivo con barrera settle-all.
    ///
    /// Nunca devuelve error: los fallos se cuentan en el resultado.
    pub async fn send_bulk(&self, user_ids: &[String], title: &str, body: &str) -> DispatchResult {
        let handles: Vec<_> = user_ids
            .iter()
            .map(|user_id| {
                let dispatcher = self.clone();
                let user_id = user_id.clone();
                let title = title.to_string();
                let body = body.to_string();
                tokio::spawn(async move { dispatcher.send(&user_id, &title, &body).await })
            })
            .collect();

        let outcomes = futures::future::join_all(handles).await;

        let mut result = DispatchResult {
            total: user_ids.len(),
            ..Default::default()
        };
        for (user_id, outcome) in user_ids.iter().zip(outcomes) {
            let reason = match outcome {
                Ok(Ok(_)) => {
                    result.successful += 1;
                    continue;
                }
                Ok(Err(e)) => e.kind().to_string(),
                Err(join_error) => format!("task failed: {}", join_error),
            };
            result.failures.push(DispatchFailure {
                user_id: user_id.clone(),
                reason,
            });
        }
        result.failed = result.total - result.successful;

        tracing::info!(
            total = result.total,
            successful = result.successful,
            failed = result.failed,
            "Bulk notification dispatched"
        );
        result
    }

    pub async fn list_notifications(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        self.log.list_for_user(user_id).await
    }

    pub async fn mark_read(&self, notification_id: &str, user_id: &str) -> AppResult<()> {
        let found = self
            .log
            .mark_read(notification_id, user_id, current_timestamp())
            .await?;
        if !found {
            return Err(AppError::not_found_id("Notificación", notification_id));
        }
        Ok(())
    }
}

/// Título y cuerpo del aviso al cliente para un cambio de estado
pub fn customer_message(event: &TransitionEvent) -> Option<(String, String)> {
    let order = &event.order;
    let message = match event.to_status {
        OrderStatus::New => return None,
        OrderStatus::Accepted => (
            "Pedido aceptado".to_string(),
            "El restaurante está preparando tu pedido".to_string(),
        ),
        OrderStatus::Ready => (
            "Pedido listo".to_string(),
            match &order.confirmation_code {
                Some(code) => format!("Tu pedido está listo. Código de entrega: {}", code),
                None => "Tu pedido está listo".to_string(),
            },
        ),
        OrderStatus::Delivered => ("Pedido entregado".to_string(), "¡Buen provecho!".to_string()),
        OrderStatus::Rejected => (
            "Pedido rechazado".to_string(),
            order
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "El restaurante no pudo aceptar tu pedido".to_string()),
        ),
        OrderStatus::Cancelled => (
            "Pedido cancelado".to_string(),
            order
                .cancellation_reason
                .clone()
                .unwrap_or_else(|| "Tu pedido fue cancelado".to_string()),
        ),
    };
    Some(message)
}

/// Avisa al cliente de cada cambio de estado de su pedido
pub struct CustomerNotifier {
    dispatcher: NotificationDispatcher,
}

impl CustomerNotifier {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl TransitionListener for CustomerNotifier {
    async fn on_transition(&self, event: &TransitionEvent) {
        let Some((title, body)) = customer_message(event) else {
            return;
        };
        let customer_id = &event.order.customer_id;
        match self.dispatcher.send(customer_id, &title, &body).await {
            Ok(_) => {}
            Err(AppError::NoDeviceToken(_)) => {
                tracing::debug!(
                    customer_id = %customer_id,
                    order_id = %event.order_id,
                    "Customer has no device, skipping push"
                );
            }
            Err(e) => {
                tracing::warn!(
                    customer_id = %customer_id,
                    order_id = %event.order_id,
                    error = %e,
                    "Customer notification failed"
                );
            }
        }
    }
}
