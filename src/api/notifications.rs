//! # API de Notificaciones
//!
//! Registro de dispositivos, envío individual y masivo, bandeja del usuario.

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use super::{AppError, AppResult};
use crate::app::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterDevice {
    user_id: String,
    push_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendNotification {
    user_id: String,
    title: String,
    body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkNotification {
    user_ids: Vec<String>,
    title: String,
    body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkRead {
    user_id: String,
}

fn validate_message(title: &str, body: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation_field("title", "es requerido"));
    }
    if body.trim().is_empty() {
        return Err(AppError::validation_field("body", "es requerido"));
    }
    Ok(())
}

/// Registra el token push de un usuario; reemplaza el anterior
#[post("/devices")]
async fn register_device(
    state: web::Data<AppState>,
    data: web::Json<RegisterDevice>,
) -> AppResult<impl Responder> {
    let registration = state
        .dispatcher
        .register_device(&data.user_id, &data.push_token)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Dispositivo registrado correctamente",
        "userId": registration.user_id,
    })))
}

/// Envía una notificación a un usuario
///
/// # Errores
/// - `404 Not Found`: El usuario no tiene dispositivo registrado
#[post("/notifications/send")]
async fn send_notification(
    state: web::Data<AppState>,
    data: web::Json<SendNotification>,
) -> AppResult<impl Responder> {
    validate_message(&data.title, &data.body)?;
    let notification = state
        .dispatcher
        .send(&data.user_id, &data.title, &data.body)
        .await?;
    Ok(HttpResponse::Ok().json(notification))
}

/// Envío masivo; siempre responde `200` con el conteo de éxitos y fallos
///
/// # Respuesta
/// ```json
/// { "total": 5, "successful": 3, "failed": 2, "failures": [ ... ] }
/// ```
#[post("/notifications/bulk")]
async fn send_bulk(
    state: web::Data<AppState>,
    data: web::Json<BulkNotification>,
) -> AppResult<impl Responder> {
    validate_message(&data.title, &data.body)?;
    let result = state
        .dispatcher
        .send_bulk(&data.user_ids, &data.title, &data.body)
        .await;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/users/{id}/notifications")]
async fn list_notifications(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let notifications = state.dispatcher.list_notifications(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[post("/notifications/{id}/read")]
async fn mark_read(
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<MarkRead>,
) -> AppResult<impl Responder> {
    let notification_id = path.into_inner();
    state.dispatcher.mark_read(&notification_id, &data.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Notificación marcada como leída",
        "id": notification_id,
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register_device);
    cfg.service(send_notification);
    cfg.service(send_bulk);
    cfg.service(list_notifications);
    cfg.service(mark_read);
}
