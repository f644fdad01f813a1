//! # Pispas Delivery
//!
//! Núcleo de la plataforma de pedidos a domicilio:
//!
//! - **Horarios**: apertura de restaurantes con intervalos que cruzan la medianoche
//! - **Ciclo de vida**: máquina de estados de pedidos con escrituras compare-and-swap
//! - **Notificaciones**: envío individual y masivo a dispositivos
//! - **Tiempo real**: difusión por restaurante a los paneles conectados
//!
//! ## Arquitectura
//!
//! ```text
//! API REST (Actix Web) ── SSE ──> paneles
//!     ↓
//! Servicios (schedule, lifecycle, dispatch, realtime)
//!     ↓ contratos de persistencia
//! MongoDB | memoria
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod services;
