//! # Manejo de errores
//!
//! Jerarquía única de errores de la aplicación construida con thiserror.
//! Cada variante se traduce a un código HTTP y a un [`ErrorResponse`] JSON.

use actix_web::{HttpResponse, ResponseError};
use std::error::Error;
use thiserror::Error;

use crate::db::OrderStatus;

/// Tipos de error de la aplicación con contexto
#[derive(Error, Debug)]
pub enum AppError {
    /// Error de base de datos con contexto adicional
    ///
    /// Mantiene la cadena de errores original de mongodb para depuración.
    #[error("Error de base de datos en operación '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// Error de validación con campo específico
    #[error("Error de validación en campo '{field}': {message}")]
    ValidationWithField {
        field: String,
        message: String,
    },

    /// Error de validación general
    #[error("Error de validación: {0}")]
    Validation(String),

    /// Transición de estado no permitida por el ciclo de vida del pedido
    #[error("Transición inválida: no se puede '{action}' un pedido en estado {from}")]
    InvalidTransition {
        from: OrderStatus,
        action: &'static str,
    },

    /// El código de confirmación de entrega no coincide
    #[error("El código de confirmación no coincide para el pedido '{order_id}'")]
    ConfirmationMismatch {
        order_id: String,
    },

    /// El usuario no tiene dispositivo registrado
    #[error("El usuario '{0}' no tiene token de dispositivo registrado")]
    NoDeviceToken(String),

    /// Error de recurso no encontrado
    #[error("No encontrado: {resource_type} con ID '{id}'")]
    NotFoundWithId {
        resource_type: String,
        id: String,
    },

    /// Error de conflicto (escritura concurrente)
    #[error("Conflicto: {0}")]
    Conflict(String),

    /// Error interno simple
    #[error("Error interno: {0}")]
    Internal(String),
}

// Métodos helper para crear errores con contexto
impl AppError {
    /// Crea un error de base de datos con contexto de operación
    pub fn database(operation: &str, source: mongodb::error::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            source,
        }
    }

    /// Crea un error de validación con campo específico
    pub fn validation_field(field: &str, message: &str) -> Self {
        Self::ValidationWithField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Crea un error de no encontrado con ID
    pub fn not_found_id(resource_type: &str, id: &str) -> Self {
        Self::NotFoundWithId {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Nombre estable del tipo de error, usado en logs y en las respuestas
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database { .. } => "database",
            Self::ValidationWithField { .. } | Self::Validation(_) => "validation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ConfirmationMismatch { .. } => "confirmation_mismatch",
            Self::NoDeviceToken(_) => "no_device_token",
            Self::NotFoundWithId { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Database { operation, source } => {
                tracing::error!(
                    operation = %operation,
                    error = %source,
                    error_chain = ?source.source(),
                    "Database error occurred"
                );
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Error de base de datos".to_string(),
                    message: "Error interno del servidor".to_string(),
                })
            }
            Self::ValidationWithField { field, message } => {
                tracing::warn!(
                    field = %field,
                    message = %message,
                    "Validation error"
                );
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Error de validación".to_string(),
                    message: format!("Campo '{}': {}", field, message),
                })
            }
            Self::Validation(message) => {
                tracing::warn!(message = %message, "Validation error");
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Error de validación".to_string(),
                    message: message.clone(),
                })
            }
            Self::InvalidTransition { from, action } => {
                tracing::info!(from = %from, action = %action, "Rejected order transition");
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Transición inválida".to_string(),
                    message: self.to_string(),
                })
            }
            Self::Conflict(message) => {
                tracing::info!(message = %message, "Concurrent write conflict");
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Conflicto".to_string(),
                    message: message.clone(),
                })
            }
            Self::ConfirmationMismatch { order_id } => {
                tracing::warn!(order_id = %order_id, "Delivery confirmation code mismatch");
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Código incorrecto".to_string(),
                    message: self.to_string(),
                })
            }
            Self::NoDeviceToken(user_id) => {
                tracing::info!(user_id = %user_id, "No device token registered");
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Sin dispositivo".to_string(),
                    message: self.to_string(),
                })
            }
            Self::NotFoundWithId { resource_type, id } => {
                tracing::info!(
                    resource_type = %resource_type,
                    id = %id,
                    "Resource not found"
                );
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "No encontrado".to_string(),
                    message: format!("{} con ID '{}' no encontrado", resource_type, id),
                })
            }
            error @ Self::Internal(_) => {
                tracing::error!(
                    error = %error,
                    error_chain = ?error.source(),
                    "General error"
                );
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Error".to_string(),
                    message: error.to_string(),
                })
            }
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type AppResult<T> = Result<T, AppError>;

pub trait ResultExt<T> {
    fn map_err_validation(self, message: &str) -> AppResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + 'static,
{
    fn map_err_validation(self, message: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Validation(format!("{}: {}", message, e)))
    }
}
