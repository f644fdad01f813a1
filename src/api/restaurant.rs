//! # API de Horarios de Restaurantes
//!
//! - Consultar el horario y el estado de apertura actual
//! - Actualizar el horario (horas `HH:MM`, días cerrados `"0,6"`)

use actix_web::{get, put, web, HttpResponse, Responder};

use super::AppResult;
use crate::app::AppState;
use crate::services::schedule::{self, UpdateSchedule};

/// Devuelve el horario con su estado en la hora local del restaurante
///
/// # Respuesta
/// ```json
/// {
///   "schedule": { "openTime": "20:00", "closeTime": "02:00", "closedDays": [0] },
///   "isOpen": false,
///   "message": "Abre a las 20:00",
///   "formatted": "20:00 - 02:00 (Cerrado: Dom)",
///   "minutesUntilOpen": 95
/// }
/// ```
///
/// Un restaurante sin horario guardado se considera abierto.
#[get("/restaurants/{id}/schedule")]
async fn get_schedule(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let restaurant_id = path.into_inner();
    let hours = state
        .schedules
        .find_schedule(&restaurant_id)
        .await?
        .unwrap_or_default();

    let summary = schedule::summarize(hours, state.config.restaurant_now());
    Ok(HttpResponse::Ok().json(summary))
}

/// Reemplaza el horario del restaurante
///
/// # Cuerpo
/// ```json
/// { "openTime": "09:00", "closeTime": "17:00", "closedDays": "0,6" }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Hora fuera de formato `HH:MM` o día fuera de 0-6
#[put("/restaurants/{id}/schedule")]
async fn update_schedule(
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<UpdateSchedule>,
) -> AppResult<impl Responder> {
    let restaurant_id = path.into_inner();
    let hours = schedule::validate_schedule_update(&data)?;

    state.schedules.save_schedule(&restaurant_id, &hours).await?;
    tracing::info!(
        restaurant_id = %restaurant_id,
        schedule = %schedule::format_schedule(&hours),
        "Schedule updated"
    );

    let summary = schedule::summarize(hours, state.config.restaurant_now());
    Ok(HttpResponse::Ok().json(summary))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_schedule);
    cfg.service(update_schedule);
}
