//! # Servicios del núcleo
//!
//! - [`schedule`] - Apertura de restaurantes según su horario
//! - [`lifecycle`] - Máquina de estados de pedidos
//! - [`dispatch`] - Notificaciones a dispositivos
//! - [`realtime`] - Difusión por restaurante a paneles conectados

pub mod dispatch;
pub mod lifecycle;
pub mod realtime;
pub mod schedule;

pub use dispatch::{CustomerNotifier, LogPushGateway, NotificationDispatcher, PushGateway};
pub use lifecycle::{DeliveryCodePolicy, OrderLifecycle, TransitionEvent, TransitionListener};
pub use realtime::{ClientMessage, ConnectionId, RealtimeEvent, RealtimeHub};
