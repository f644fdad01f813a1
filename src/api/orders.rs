//! # API de Pedidos
//!
//! Creación de pedidos y transiciones de estado:
//! - Crear pedidos (rechazados si el restaurante está cerrado)
//! - Consultar un pedido o los pedidos de un restaurante
//! - Aceptar, rechazar, marcar listo, entregar y cancelar
//!
//! Las transiciones devuelven `409 Conflict` tanto si no son válidas desde el
//! estado actual como si otra petición cambió el pedido al mismo tiempo.

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;

use super::AppResult;
use crate::app::AppState;
use crate::db::{NewOrder, OrderStatus};

/// Cuerpo opcional para rechazar o cancelar
#[derive(Deserialize, Default)]
struct ReasonBody {
    reason: Option<String>,
}

/// Cuerpo opcional para confirmar la entrega
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DeliverBody {
    confirmation_code: Option<String>,
}

/// Parámetros de consulta para listar pedidos
#[derive(Deserialize)]
struct OrdersQuery {
    /// Filtrar por estado (`NEW`, `ACCEPTED`, ...)
    status: Option<String>,
}

/// Crea un pedido nuevo
///
/// # Validaciones
/// - Al menos un producto, cada uno con cantidad mayor a 0
/// - El restaurante debe estar abierto según su horario
///
/// # Respuesta
/// `201 Created` con el pedido completo. Se emite `newOrder` a la sala del
/// restaurante.
///
/// # Errores
/// - `400 Bad Request`: Datos inválidos o restaurante cerrado
/// - `500 Internal Server Error`: Error de base de datos
#[post("/orders")]
async fn place_order(
    state: web::Data<AppState>,
    data: web::Json<NewOrder>,
) -> AppResult<impl Responder> {
    let now = state.config.restaurant_now();
    let order = state.lifecycle.place_order(data.into_inner(), now).await?;
    Ok(HttpResponse::Created().json(order))
}

#[get("/orders/{id}")]
async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let order = state.lifecycle.get_order(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Lista los pedidos de un restaurante, más recientes primero
///
/// Los paneles lo usan para reconciliar su estado al reconectar, ya que los
/// eventos en tiempo real no se repiten.
#[get("/restaurants/{id}/orders")]
async fn list_orders(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<OrdersQuery>,
) -> AppResult<impl Responder> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let orders = state.lifecycle.list_orders(&path.into_inner(), status).await?;
    Ok(HttpResponse::Ok().json(orders))
}

#[post("/orders/{id}/accept")]
async fn accept_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let order = state.lifecycle.accept(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Rechaza un pedido nuevo
///
/// # Cuerpo (opcional)
/// ```json
/// { "reason": "Sin stock de empanadas" }
/// ```
#[post("/orders/{id}/reject")]
async fn reject_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<ReasonBody>>,
) -> AppResult<impl Responder> {
    let reason = body.map(|b| b.into_inner()).unwrap_or_default().reason;
    let order = state.lifecycle.reject(&path.into_inner(), reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/orders/{id}/ready")]
async fn mark_ready(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let order = state.lifecycle.mark_ready(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Marca un pedido listo como entregado
///
/// # Cuerpo (opcional)
/// ```json
/// { "confirmationCode": "0427" }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Código incorrecto con `DELIVERY_CODE_POLICY=enforced`
/// - `409 Conflict`: El pedido no está listo o cambió al mismo tiempo
#[post("/orders/{id}/deliver")]
async fn mark_delivered(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<DeliverBody>>,
) -> AppResult<impl Responder> {
    let code = body.map(|b| b.into_inner()).unwrap_or_default().confirmation_code;
    let order = state.lifecycle.mark_delivered(&path.into_inner(), code).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/orders/{id}/cancel")]
async fn cancel_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<ReasonBody>>,
) -> AppResult<impl Responder> {
    let reason = body.map(|b| b.into_inner()).unwrap_or_default().reason;
    let order = state.lifecycle.cancel(&path.into_inner(), reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Configura las rutas relacionadas con pedidos
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(place_order);
    cfg.service(get_order);
    cfg.service(list_orders);
    cfg.service(accept_order);
    cfg.service(reject_order);
    cfg.service(mark_ready);
    cfg.service(mark_delivered);
    cfg.service(cancel_order);
}
