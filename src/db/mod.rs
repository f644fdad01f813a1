// src/db/mod.rs
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod store;

pub use memory::MemoryStore;
pub use models::{
    current_timestamp, DeviceRegistration, DispatchFailure, DispatchResult, NewOrder, Notification,
    Order, OrderAction, OrderItem, OrderStatus, RestaurantSchedule, StatusUpdate,
};
pub use self::mongodb::MongoRepo;
pub use store::{DeviceTokenStore, NotificationLog, OrderStore, ScheduleStore};
