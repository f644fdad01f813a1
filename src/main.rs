//! # Pispas Delivery Server
//!
//! Servidor del núcleo de pedidos a domicilio construido con Rust, Actix Web y MongoDB.
//!
//! ## Configuración
//!
//! El servidor se configura mediante variables de entorno (archivo `.env`):
//!
//! ```env
//! # Base de datos MongoDB (o STORAGE_BACKEND=memory)
//! STORAGE_BACKEND=mongodb
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=pispas_delivery
//!
//! # Servidor
//! BIND_ADDRESS=0.0.0.0:8080
//!
//! # Hora local de los restaurantes (minutos respecto a UTC)
//! SCHEDULE_UTC_OFFSET_MINUTES=-180
//!
//! # Código de entrega: advisory | enforced
//! DELIVERY_CODE_POLICY=advisory
//!
//! # Logging
//! RUST_LOG=debug,mongodb=info
//! ```

use actix_web::{middleware::Logger, web, App, HttpServer};

use pispas_delivery::api;
use pispas_delivery::app::AppState;
use pispas_delivery::config::AppConfig;

/// Función principal que inicia el servidor web
///
/// 1. Carga variables de entorno desde `.env`
/// 2. Configura el sistema de logging con tracing
/// 3. Abre el almacenamiento configurado y crea índices
/// 4. Conecta servicios: ciclo de vida, notificaciones y tiempo real
/// 5. Inicia el servidor HTTP en la dirección especificada
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["pispas_delivery=debug", "mongodb=info"] {
        if let Ok(directive) = directive.parse::<tracing_subscriber::filter::Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Iniciando Pispas Delivery Server...");

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuración inválida: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let state = AppState::from_config(config.clone()).await.map_err(|e| {
        tracing::error!("Error inicializando almacenamiento: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Error de almacenamiento: {}", e))
    })?;

    tracing::info!(
        bind_address = %config.bind_address,
        storage = ?config.storage,
        delivery_codes = ?config.delivery_codes,
        "Servidor iniciando"
    );

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Logger::default())
            .configure(api::init_routes)
    })
        .bind(&config.bind_address)?
        .run()
        .await
}
