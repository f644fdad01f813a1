//! # API en tiempo real
//!
//! Los paneles abren un stream de server-sent events y envían sus mensajes
//! (`joinRestaurant`, `leaveRestaurant`, `on`) por POST con el ID de conexión
//! recibido en el evento `connected`.
//!
//! ```text
//! GET  /realtime/connect?client_key=panel-42  -> event: connected
//! POST /realtime/{connection}/messages
//!      {"event":"joinRestaurant","data":{"restaurantId":"r1"}}
//!                                             <- event: orderUpdate
//! ```

use actix_web::{delete, get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;

use super::AppResult;
use crate::app::AppState;
use crate::services::{ClientMessage, ConnectionId, RealtimeEvent};

#[derive(Deserialize)]
struct ConnectQuery {
    /// Clave estable del cliente para restaurar sus handlers al reconectar
    client_key: Option<String>,
}

fn sse_frame(event: &RealtimeEvent) -> String {
    match serde_json::to_string(event) {
        Ok(data) => format!("event: {}\ndata: {}\n\n", event.event, data),
        Err(e) => {
            tracing::error!(event = %event.event, error = %e, "Could not encode realtime event");
            String::new()
        }
    }
}

/// Abre una conexión en tiempo real como stream `text/event-stream`
///
/// La conexión se libera en la siguiente publicación después de que el
/// cliente cierre el stream.
#[get("/realtime/connect")]
async fn connect(
    state: web::Data<AppState>,
    query: web::Query<ConnectQuery>,
) -> AppResult<impl Responder> {
    let (id, receiver) = state.realtime.connect(query.into_inner().client_key).await;
    tracing::info!(connection = %id, "Realtime client connected");

    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        let event = receiver.recv().await?;
        let frame = web::Bytes::from(sse_frame(&event));
        Some((Ok::<_, Infallible>(frame), receiver))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

/// Procesa un mensaje del cliente
///
/// # Errores
/// - `400 Bad Request`: ID de conexión mal formado
/// - `404 Not Found`: La conexión ya no existe; el cliente debe reconectar
#[post("/realtime/{connection}/messages")]
async fn client_message(
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<ClientMessage>,
) -> AppResult<impl Responder> {
    let id: ConnectionId = path.into_inner().parse()?;
    state.realtime.handle_message(id, data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "connectionId": id.to_string() })))
}

#[delete("/realtime/{connection}")]
async fn disconnect(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id: ConnectionId = path.into_inner().parse()?;
    state.realtime.disconnect(id).await;
    Ok(HttpResponse::NoContent().finish())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(connect);
    cfg.service(client_message);
    cfg.service(disconnect);
}
