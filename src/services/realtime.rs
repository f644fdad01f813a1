//! # Canal en tiempo real
//!
//! Difusión por sala: cada restaurante tiene una sala identificada por su ID y
//! los paneles conectados se unen a ella para recibir `newOrder` y
//! `orderUpdate`.
//!
//! Las conexiones viven en un arena de ranuras indexadas. Cada ranura guarda
//! sus salas, sus handlers registrados y el emisor de su cola de salida. Un
//! [`ConnectionId`] lleva índice y generación, así un ID viejo nunca apunta a
//! la conexión que reutilizó la ranura.
//!
//! La entrega es como mucho una vez por suscriptor conectado: no hay buffer
//! para desconectados ni repetición al reconectar. Al reconectar con la misma
//! `client_key` se restauran los handlers, pero el cliente debe volver a unirse
//! a sus salas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::api::{AppError, AppResult, ResultExt};
use crate::db::Order;
use crate::services::lifecycle::{TransitionEvent, TransitionListener};

pub const EVENT_NEW_ORDER: &str = "newOrder";
pub const EVENT_ORDER_UPDATE: &str = "orderUpdate";
pub const EVENT_CONNECTED: &str = "connected";

/// Máximo de `client_key` cuyos handlers se recuerdan
pub const DEFAULT_BINDING_LIMIT: usize = 4096;

/// Identificador de conexión: índice en el arena + generación de la ranura
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    index: usize,
    generation: u64,
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.index, self.generation)
    }
}

impl FromStr for ConnectionId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, generation) = s.split_once('-').ok_or_else(|| {
            AppError::validation_field("connection", "formato esperado 'indice-generacion'")
        })?;
        Ok(Self {
            index: index.parse().map_err_validation("índice de conexión inválido")?,
            generation: generation
                .parse()
                .map_err_validation("generación de conexión inválida")?,
        })
    }
}

/// Evento entregado a una conexión
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    pub event: String,
    pub room: Option<String>,
    pub payload: serde_json::Value,
}

/// Mensajes cliente -> servidor
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "joinRestaurant", rename_all = "camelCase")]
    JoinRestaurant { restaurant_id: String },
    #[serde(rename = "leaveRestaurant", rename_all = "camelCase")]
    LeaveRestaurant { restaurant_id: String },
    /// Registra un handler: la conexión sólo recibirá los eventos registrados
    #[serde(rename = "on")]
    On { event: String },
}

struct ConnectionSlot {
    generation: u64,
    client_key: Option<String>,
    rooms: BTreeSet<String>,
    handlers: BTreeSet<String>,
    sender: mpsc::UnboundedSender<RealtimeEvent>,
}

impl ConnectionSlot {
    fn wants(&self, room: &str, event: &str) -> bool {
        self.rooms.contains(room) && (self.handlers.is_empty() || self.handlers.contains(event))
    }
}

struct Binding {
    handlers: BTreeSet<String>,
    touched: u64,
}

struct Registry {
    slots: Vec<Option<ConnectionSlot>>,
    /// Última generación usada por ranura, sobrevive a la desconexión
    generations: Vec<u64>,
    free: Vec<usize>,
    /// Handlers por `client_key` para restaurarlos al reconectar
    bindings: HashMap<String, Binding>,
    binding_limit: usize,
    clock: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_binding_limit(DEFAULT_BINDING_LIMIT)
    }
}

impl Registry {
    fn with_binding_limit(binding_limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            bindings: HashMap::new(),
            binding_limit,
            clock: 0,
        }
    }

    fn slot_mut(&mut self, id: ConnectionId) -> AppResult<&mut ConnectionSlot> {
        self.slots
            .get_mut(id.index)
            .and_then(Option::as_mut)
            .filter(|slot| slot.generation == id.generation)
            .ok_or_else(|| AppError::not_found_id("Conexión", &id.to_string()))
    }

    fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.take().is_some() {
                self.free.push(index);
            }
        }
    }

    /// Libera las ranuras cuyo receptor ya se cerró
    fn reap_closed(&mut self) -> usize {
        let closed: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(|s| s.sender.is_closed()))
            .map(|(index, _)| index)
            .collect();
        for index in &closed {
            self.release(*index);
        }
        closed.len()
    }

    fn recall(&mut self, client_key: &str) -> BTreeSet<String> {
        self.clock += 1;
        match self.bindings.get_mut(client_key) {
            Some(binding) => {
                binding.touched = self.clock;
                binding.handlers.clone()
            }
            None => BTreeSet::new(),
        }
    }

    /// Guarda los handlers de la clave; al pasar el límite olvida la menos usada
    fn remember(&mut self, client_key: String, handlers: BTreeSet<String>) {
        self.clock += 1;
        let touched = self.clock;
        self.bindings.insert(client_key, Binding { handlers, touched });

        while self.bindings.len() > self.binding_limit {
            let oldest = self
                .bindings
                .iter()
                .min_by_key(|(_, binding)| binding.touched)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => self.bindings.remove(&key),
                None => break,
            };
        }
    }
}

/// Canal de difusión por restaurante. Clonar comparte el mismo registro.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    registry: Arc<RwLock<Registry>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub que recuerda handlers de como mucho `limit` claves de cliente
    pub fn with_binding_limit(limit: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::with_binding_limit(limit))),
        }
    }

    /// Abre una conexión y devuelve su cola de salida.
    ///
    /// El primer evento de la cola es `connected` con el ID asignado.
    pub async fn connect(
        &self,
        client_key: Option<String>,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<RealtimeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = self.registry.write().await;
        let reaped = registry.reap_closed();
        if reaped > 0 {
            tracing::debug!(reaped, "Released closed realtime connections");
        }

        let index = match registry.free.pop() {
            Some(index) => index,
            None => {
                registry.slots.push(None);
                registry.generations.push(0);
                registry.slots.len() - 1
            }
        };
        registry.generations[index] += 1;
        let generation = registry.generations[index];

        let handlers = client_key
            .as_deref()
            .map(|key| registry.recall(key))
            .unwrap_or_default();
        let restored = handlers.len();

        let id = ConnectionId { index, generation };
        let _ = sender.send(RealtimeEvent {
            event: EVENT_CONNECTED.to_string(),
            room: None,
            payload: serde_json::json!({ "connectionId": id.to_string() }),
        });

        registry.slots[index] = Some(ConnectionSlot {
            generation,
            client_key,
            rooms: BTreeSet::new(),
            handlers,
            sender,
        });

        tracing::debug!(
            connection = %id,
            restored_handlers = restored,
            "Realtime connection opened"
        );
        (id, receiver)
    }

    pub async fn disconnect(&self, id: ConnectionId) {
        let mut registry = self.registry.write().await;
        if registry.slot_mut(id).is_ok() {
            registry.release(id.index);
            tracing::debug!(connection = %id, "Realtime connection closed");
        }
    }

    /// Registra un handler para `event` en la conexión y lo recuerda para
    /// futuras reconexiones con la misma `client_key`.
    pub async fn on(&self, id: ConnectionId, event: &str) -> AppResult<()> {
        let mut registry = self.registry.write().await;
        let slot = registry.slot_mut(id)?;
        slot.handlers.insert(event.to_string());
        let key = slot.client_key.clone();
        let handlers = slot.handlers.clone();
        if let Some(key) = key {
            registry.remember(key, handlers);
        }
        Ok(())
    }

    pub async fn join(&self, id: ConnectionId, restaurant_id: &str) -> AppResult<()> {
        if restaurant_id.trim().is_empty() {
            return Err(AppError::validation_field("restaurantId", "es requerido"));
        }
        let mut registry = self.registry.write().await;
        registry.slot_mut(id)?.rooms.insert(restaurant_id.to_string());
        tracing::debug!(connection = %id, restaurant_id = %restaurant_id, "Joined restaurant room");
        Ok(())
    }

    pub async fn leave(&self, id: ConnectionId, restaurant_id: &str) -> AppResult<()> {
        let mut registry = self.registry.write().await;
        registry.slot_mut(id)?.rooms.remove(restaurant_id);
        Ok(())
    }

    pub async fn handle_message(&self, id: ConnectionId, message: ClientMessage) -> AppResult<()> {
        match message {
            ClientMessage::JoinRestaurant { restaurant_id } => self.join(id, &restaurant_id).await,
            ClientMessage::LeaveRestaurant { restaurant_id } => {
                self.leave(id, &restaurant_id).await
            }
            ClientMessage::On { event } => self.on(id, &event).await,
        }
    }

    /// Entrega `payload` a cada conexión de la sala. Devuelve a cuántas llegó.
    ///
    /// Toda conexión cuya cola ya no tiene receptor se libera sin reportar
    /// error, esté o no en la sala.
    pub async fn publish(
        &self,
        restaurant_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> usize {
        let mut registry = self.registry.write().await;
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (index, slot) in registry.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            if slot.sender.is_closed() {
                dead.push(index);
                continue;
            }
            if !slot.wants(restaurant_id, event) {
                continue;
            }
            let message = RealtimeEvent {
                event: event.to_string(),
                room: Some(restaurant_id.to_string()),
                payload: payload.clone(),
            };
            if slot.sender.send(message).is_ok() {
                delivered += 1;
            } else {
                dead.push(index);
            }
        }

        for index in dead {
            registry.release(index);
        }

        tracing::debug!(
            restaurant_id = %restaurant_id,
            event = %event,
            delivered,
            "Realtime event published"
        );
        delivered
    }

    pub async fn publish_order(&self, event: &str, order: &Order) -> usize {
        match serde_json::to_value(order) {
            Ok(payload) => self.publish(&order.restaurant_id, event, payload).await,
            Err(e) => {
                tracing::error!(
                    order_id = %order.id,
                    error = %e,
                    "Could not serialize order for broadcast"
                );
                0
            }
        }
    }

    /// Conexiones actualmente unidas a la sala del restaurante
    pub async fn room_size(&self, restaurant_id: &str) -> usize {
        let registry = self.registry.read().await;
        registry
            .slots
            .iter()
            .flatten()
            .filter(|slot| slot.rooms.contains(restaurant_id))
            .count()
    }
}

#[async_trait]
impl TransitionListener for RealtimeHub {
    async fn on_order_created(&self, order: &Order) {
        self.publish_order(EVENT_NEW_ORDER, order).await;
    }

    async fn on_transition(&self, event: &TransitionEvent) {
        self.publish_order(EVENT_ORDER_UPDATE, &event.order).await;
    }
}
