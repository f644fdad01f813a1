//! # Configuración
//!
//! Variables de entorno (cargadas también desde `.env` con dotenvy):
//!
//! - `BIND_ADDRESS`: dirección del servidor (default `0.0.0.0:8080`)
//! - `STORAGE_BACKEND`: `mongodb` o `memory` (default `mongodb`)
//! - `MONGODB_URI`: URI de MongoDB (default `mongodb://localhost:27017`)
//! - `MONGODB_DATABASE`: base de datos (default `pispas_delivery`)
//! - `SCHEDULE_UTC_OFFSET_MINUTES`: desfase de la hora local de los restaurantes (default `0`)
//! - `DELIVERY_CODE_POLICY`: `advisory` o `enforced` (default `advisory`)

use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use std::env;
use std::str::FromStr;

use crate::api::{AppError, AppResult, ResultExt};
use crate::services::DeliveryCodePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::validation_field(
                "STORAGE_BACKEND",
                &format!("valor '{}' no soportado (mongodb | memory)", other),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub storage: StorageBackend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub schedule_offset: FixedOffset,
    pub delivery_codes: DeliveryCodePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            storage: StorageBackend::MongoDb,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_database: "pispas_delivery".to_string(),
            schedule_offset: Utc.fix(),
            delivery_codes: DeliveryCodePolicy::Advisory,
        }
    }
}

fn parse_offset(raw: &str) -> AppResult<FixedOffset> {
    let minutes: i32 = raw
        .trim()
        .parse()
        .map_err_validation("SCHEDULE_UTC_OFFSET_MINUTES")?;
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| AppError::validation_field("SCHEDULE_UTC_OFFSET_MINUTES", "fuera de rango"))
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración desde una función de búsqueda de variables
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let storage = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.storage,
        };
        let schedule_offset = match lookup("SCHEDULE_UTC_OFFSET_MINUTES") {
            Some(raw) => parse_offset(&raw)?,
            None => defaults.schedule_offset,
        };
        let delivery_codes = match lookup("DELIVERY_CODE_POLICY") {
            Some(raw) => raw.parse()?,
            None => defaults.delivery_codes,
        };

        Ok(Self {
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            storage,
            mongodb_uri: lookup("MONGODB_URI").unwrap_or(defaults.mongodb_uri),
            mongodb_database: lookup("MONGODB_DATABASE").unwrap_or(defaults.mongodb_database),
            schedule_offset,
            delivery_codes,
        })
    }

    /// Hora local de los restaurantes, usada para evaluar horarios
    pub fn restaurant_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.schedule_offset).naive_local()
    }
}
