//! # Utilidades de logging para errores
//!
//! Registro de la cadena completa de errores (`source()`) de los fallos de
//! almacenamiento antes de convertirlos en [`AppError`](super::AppError).

use std::error::Error as StdError;

/// Recorre la cadena de `source()` del error
fn collect_chain<E>(error: &E) -> Vec<String>
where
    E: StdError + 'static,
{
    let mut error_chain = Vec::new();
    let mut current_error: Option<&dyn StdError> = Some(error);

    while let Some(err) = current_error {
        error_chain.push(err.to_string());
        current_error = err.source();
    }
    error_chain
}

/// Registra la cadena completa de errores
///
/// # Parámetros
/// - `error`: Error a analizar y registrar
/// - `context`: Contexto opcional para añadir información
pub fn log_error_chain<E>(error: &E, context: Option<&str>)
where
    E: StdError + 'static,
{
    let error_chain = collect_chain(error);

    if let Some(ctx) = context {
        tracing::error!(
            context = %ctx,
            error_chain = ?error_chain,
            depth = error_chain.len(),
            "Error with full chain (with context)"
        );
    } else {
        tracing::error!(
            error_chain = ?error_chain,
            depth = error_chain.len(),
            "Error with full chain"
        );
    }
}

/// Extension trait para Results que añade logging automático de error chains
///
/// ```text
/// repo.orders()
///     .find_one(doc! { "id": order_id })
///     .await
///     .log_error_context("finding order")
///     .map_err(|e| AppError::database("find_order", e))?;
/// ```
pub trait ErrorLogExt<T, E> {
    /// Loggea la cadena de errores con contexto adicional
    fn log_error_context(self, context: &str) -> Result<T, E>;
}

impl<T, E> ErrorLogExt<T, E> for Result<T, E>
where
    E: StdError + 'static,
{
    fn log_error_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            log_error_chain(error, Some(context));
        }
        self
    }
}
