//! # Módulo API
//!
//! Este módulo contiene todas las rutas y controladores de la API REST.
//!
//! ## Módulos principales
//!
//! - [`orders`] - Pedidos y sus transiciones de estado
//! - [`restaurant`] - Horarios de restaurantes
//! - [`notifications`] - Dispositivos y notificaciones
//! - [`realtime`] - Conexiones en tiempo real por restaurante
//! - [`errors`] - Manejo de errores de la aplicación

pub mod errors;
pub mod notifications;
pub mod orders;
pub mod realtime;
pub mod restaurant;
pub(crate) mod middleware;

// Re-exportar tipos comunes para facilitar su uso
pub use errors::{AppError, AppResult, ErrorResponse, ResultExt};

use actix_web::web;

/// Configura todas las rutas de la API
///
/// ## Rutas configuradas
///
/// - `/orders/*`, `/restaurants/{id}/orders` - Ver [`orders::routes`]
/// - `/restaurants/{id}/schedule` - Ver [`restaurant::routes`]
/// - `/devices`, `/notifications/*`, `/users/{id}/notifications` - Ver [`notifications::routes`]
/// - `/realtime/*` - Ver [`realtime::routes`]
///
/// # Ejemplo
///
/// ```no_run
/// use actix_web::App;
/// use pispas_delivery::api;
///
/// let app = App::new()
///     .configure(api::init_routes);
/// ```
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    orders::routes(cfg);
    restaurant::routes(cfg);
    notifications::routes(cfg);
    realtime::routes(cfg);
}
