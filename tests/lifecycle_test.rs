use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tokio::sync::{Barrier, Mutex};
use tokio_test::{assert_err, assert_ok};

use pispas_delivery::api::{AppError, AppResult};
use pispas_delivery::db::{
    MemoryStore, NewOrder, Order, OrderItem, OrderStatus, OrderStore, RestaurantSchedule,
    ScheduleStore, StatusUpdate,
};
use pispas_delivery::services::{
    DeliveryCodePolicy, OrderLifecycle, TransitionEvent, TransitionListener,
};

/// Registra todo lo que emite el ciclo de vida
#[derive(Default)]
struct RecordingListener {
    created: Mutex<Vec<String>>,
    transitions: Mutex<Vec<TransitionEvent>>,
}

#[async_trait]
impl TransitionListener for RecordingListener {
    async fn on_order_created(&self, order: &Order) {
        self.created.lock().await.push(order.id.clone());
    }

    async fn on_transition(&self, event: &TransitionEvent) {
        self.transitions.lock().await.push(event.clone());
    }
}

/// Almacén que hace coincidir dos lecturas antes de dejar escribir,
/// para forzar la carrera entre dos transiciones.
struct RacingStore {
    inner: MemoryStore,
    barrier: Barrier,
}

#[async_trait]
impl OrderStore for RacingStore {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        self.inner.insert_order(order).await
    }

    async fn find_order(&self, order_id: &str) -> AppResult<Option<Order>> {
        let found = self.inner.find_order(order_id).await?;
        self.barrier.wait().await;
        Ok(found)
    }

    async fn update_status_if(
        &self,
        order_id: &str,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> AppResult<bool> {
        self.inner.update_status_if(order_id, expected, update).await
    }

    async fn list_orders(
        &self,
        restaurant_id: &str,
        status: Option<OrderStatus>,
    ) -> AppResult<Vec<Order>> {
        self.inner.list_orders(restaurant_id, status).await
    }
}

// Lunes a mediodía
fn monday_noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn new_order() -> NewOrder {
    NewOrder {
        restaurant_id: "resto-1".to_string(),
        customer_id: "cliente-1".to_string(),
        items: vec![
            OrderItem {
                product_id: "p1".to_string(),
                name: "Empanada".to_string(),
                quantity: 3,
                unit_price_cents: 250,
            },
            OrderItem {
                product_id: "p2".to_string(),
                name: "Limonada".to_string(),
                quantity: 1,
                unit_price_cents: 400,
            },
        ],
    }
}

fn stored_order(id: &str, status: OrderStatus) -> Order {
    Order {
        id: id.to_string(),
        restaurant_id: "resto-1".to_string(),
        customer_id: "cliente-1".to_string(),
        items: new_order().items,
        total_cents: 1150,
        status,
        created_at: 1,
        updated_at: 1,
        rejection_reason: None,
        cancellation_reason: None,
        confirmation_code: Some("1234".to_string()),
    }
}

fn setup(policy: DeliveryCodePolicy) -> (OrderLifecycle, Arc<MemoryStore>, Arc<RecordingListener>) {
    let store = Arc::new(MemoryStore::new());
    let listener = Arc::new(RecordingListener::default());
    let lifecycle =
        OrderLifecycle::new(store.clone(), store.clone(), policy).with_listener(listener.clone());
    (lifecycle, store, listener)
}

#[tokio::test]
async fn place_order_derives_total_and_emits_creation() {
    let (lifecycle, store, listener) = setup(DeliveryCodePolicy::Advisory);

    let order = assert_ok!(lifecycle.place_order(new_order(), monday_noon()).await);
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.total_cents, 3 * 250 + 400);
    assert!(order.confirmation_code.is_some());

    let stored = store.find_order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored, order);
    assert_eq!(*listener.created.lock().await, vec![order.id.clone()]);
}

#[tokio::test]
async fn place_order_validates_items() {
    let (lifecycle, _, listener) = setup(DeliveryCodePolicy::Advisory);

    let mut empty = new_order();
    empty.items.clear();
    let err = assert_err!(lifecycle.place_order(empty, monday_noon()).await);
    assert!(matches!(err, AppError::ValidationWithField { ref field, .. } if field == "items"));

    let mut zero = new_order();
    zero.items[0].quantity = 0;
    assert_err!(lifecycle.place_order(zero, monday_noon()).await);

    assert!(listener.created.lock().await.is_empty());
}

#[tokio::test]
async fn place_order_rejects_totals_out_of_range() {
    let (lifecycle, store, _) = setup(DeliveryCodePolicy::Advisory);

    let mut huge_line = new_order();
    huge_line.items.truncate(1);
    huge_line.items[0].quantity = 4;
    huge_line.items[0].unit_price_cents = i64::MAX / 2;
    let err = assert_err!(lifecycle.place_order(huge_line, monday_noon()).await);
    assert!(matches!(err, AppError::ValidationWithField { ref field, .. } if field == "items"));

    let mut huge_sum = new_order();
    huge_sum.items[0].quantity = 1;
    huge_sum.items[0].unit_price_cents = i64::MAX;
    let err = assert_err!(lifecycle.place_order(huge_sum, monday_noon()).await);
    assert!(matches!(err, AppError::ValidationWithField { ref field, .. } if field == "items"));

    assert!(store.list_orders("resto-1", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn closed_restaurant_rejects_new_orders() {
    let (lifecycle, store, _) = setup(DeliveryCodePolicy::Advisory);
    let schedule = RestaurantSchedule {
        open_time: Some("20:00".to_string()),
        close_time: Some("02:00".to_string()),
        closed_days: Default::default(),
    };
    store.save_schedule("resto-1", &schedule).await.unwrap();

    let err = assert_err!(lifecycle.place_order(new_order(), monday_noon()).await);
    match err {
        AppError::Validation(message) => assert!(message.contains("Abre a las 20:00")),
        other => panic!("unexpected error: {:?}", other),
    }

    let evening = monday_noon() + chrono::Duration::hours(10);
    assert_ok!(lifecycle.place_order(new_order(), evening).await);
}

#[tokio::test]
async fn happy_path_reaches_delivered() {
    let (lifecycle, _, listener) = setup(DeliveryCodePolicy::Advisory);
    let order = lifecycle.place_order(new_order(), monday_noon()).await.unwrap();

    let accepted = assert_ok!(lifecycle.accept(&order.id).await);
    assert_eq!(accepted.status, OrderStatus::Accepted);
    let ready = assert_ok!(lifecycle.mark_ready(&order.id).await);
    assert_eq!(ready.status, OrderStatus::Ready);
    let code = order.confirmation_code.clone();
    let delivered = assert_ok!(lifecycle.mark_delivered(&order.id, code).await);
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let transitions = listener.transitions.lock().await;
    let steps: Vec<(OrderStatus, OrderStatus)> = transitions
        .iter()
        .map(|e| (e.from_status, e.to_status))
        .collect();
    assert_eq!(
        steps,
        vec![
            (OrderStatus::New, OrderStatus::Accepted),
            (OrderStatus::Accepted, OrderStatus::Ready),
            (OrderStatus::Ready, OrderStatus::Delivered),
        ]
    );
    assert!(transitions.iter().all(|e| e.restaurant_id == "resto-1" && e.order_id == order.id));
    assert_eq!(transitions[2].order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn skipping_states_is_an_invalid_transition() {
    let (lifecycle, store, listener) = setup(DeliveryCodePolicy::Advisory);
    let order = lifecycle.place_order(new_order(), monday_noon()).await.unwrap();

    let err = assert_err!(lifecycle.mark_delivered(&order.id, None).await);
    assert!(matches!(err, AppError::InvalidTransition { from: OrderStatus::New, .. }));

    let err = assert_err!(lifecycle.mark_ready(&order.id).await);
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    assert_eq!(store.find_order(&order.id).await.unwrap().unwrap().status, OrderStatus::New);
    assert!(listener.transitions.lock().await.is_empty());
}

#[tokio::test]
async fn terminal_orders_never_move() {
    let (lifecycle, store, _) = setup(DeliveryCodePolicy::Advisory);
    for (id, status) in [
        ("delivered", OrderStatus::Delivered),
        ("rejected", OrderStatus::Rejected),
        ("cancelled", OrderStatus::Cancelled),
    ] {
        store.insert_order(&stored_order(id, status)).await.unwrap();

        assert_err!(lifecycle.accept(id).await);
        assert_err!(lifecycle.reject(id, None).await);
        assert_err!(lifecycle.mark_ready(id).await);
        assert_err!(lifecycle.mark_delivered(id, None).await);
        let err = assert_err!(lifecycle.cancel(id, None).await);
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        assert_eq!(store.find_order(id).await.unwrap().unwrap().status, status);
    }
}

#[tokio::test]
async fn reject_and_cancel_keep_reasons() {
    let (lifecycle, _, _) = setup(DeliveryCodePolicy::Advisory);

    let first = lifecycle.place_order(new_order(), monday_noon()).await.unwrap();
    let rejected = lifecycle
        .reject(&first.id, Some("Sin stock".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Sin stock"));

    let second = lifecycle.place_order(new_order(), monday_noon()).await.unwrap();
    lifecycle.accept(&second.id).await.unwrap();
    lifecycle.mark_ready(&second.id).await.unwrap();
    let cancelled = lifecycle.cancel(&second.id, Some("  ".to_string())).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason, None);
}

#[tokio::test]
async fn reject_only_from_new() {
    let (lifecycle, _, _) = setup(DeliveryCodePolicy::Advisory);
    let order = lifecycle.place_order(new_order(), monday_noon()).await.unwrap();
    lifecycle.accept(&order.id).await.unwrap();

    let err = assert_err!(lifecycle.reject(&order.id, None).await);
    assert!(matches!(err, AppError::InvalidTransition { from: OrderStatus::Accepted, .. }));
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let (lifecycle, _, _) = setup(DeliveryCodePolicy::Advisory);
    let err = assert_err!(lifecycle.accept("nope").await);
    assert!(matches!(err, AppError::NotFoundWithId { .. }));
}

#[tokio::test]
async fn concurrent_accepts_exactly_one_wins() {
    let racing = Arc::new(RacingStore {
        inner: MemoryStore::new(),
        barrier: Barrier::new(2),
    });
    racing.inner.insert_order(&stored_order("o-race", OrderStatus::New)).await.unwrap();

    let listener = Arc::new(RecordingListener::default());
    let schedules = Arc::new(MemoryStore::new());
    let lifecycle = OrderLifecycle::new(racing.clone(), schedules, DeliveryCodePolicy::Advisory)
        .with_listener(listener.clone());

    let (first, second) = tokio::join!(lifecycle.accept("o-race"), lifecycle.accept("o-race"));

    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(listener.transitions.lock().await.len(), 1);
}

#[tokio::test]
async fn concurrent_accept_and_cancel_do_not_overwrite_each_other() {
    let racing = Arc::new(RacingStore {
        inner: MemoryStore::new(),
        barrier: Barrier::new(2),
    });
    racing.inner.insert_order(&stored_order("o-race", OrderStatus::New)).await.unwrap();
    let schedules = Arc::new(MemoryStore::new());
    let lifecycle = OrderLifecycle::new(racing.clone(), schedules, DeliveryCodePolicy::Advisory);

    let (accepted, cancelled) = tokio::join!(
        lifecycle.accept("o-race"),
        lifecycle.cancel("o-race", Some("cliente".to_string()))
    );

    let final_status = racing.inner.find_order("o-race").await.unwrap().unwrap().status;
    match (accepted, cancelled) {
        (Ok(_), Err(AppError::Conflict(_))) => assert_eq!(final_status, OrderStatus::Accepted),
        (Err(AppError::Conflict(_)), Ok(_)) => assert_eq!(final_status, OrderStatus::Cancelled),
        other => panic!("expected one winner and one conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn enforced_delivery_code_must_match() {
    let (lifecycle, store, _) = setup(DeliveryCodePolicy::Enforced);
    store.insert_order(&stored_order("o1", OrderStatus::Ready)).await.unwrap();

    let err = assert_err!(lifecycle.mark_delivered("o1", Some("9999".to_string())).await);
    assert!(matches!(err, AppError::ConfirmationMismatch { .. }));
    assert_err!(lifecycle.mark_delivered("o1", None).await);
    assert_eq!(store.find_order("o1").await.unwrap().unwrap().status, OrderStatus::Ready);

    let delivered = assert_ok!(lifecycle.mark_delivered("o1", Some("1234".to_string())).await);
    assert_eq!(delivered.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn advisory_delivery_code_never_blocks() {
    let (lifecycle, store, _) = setup(DeliveryCodePolicy::Advisory);
    store.insert_order(&stored_order("o1", OrderStatus::Ready)).await.unwrap();

    let delivered = assert_ok!(lifecycle.mark_delivered("o1", Some("0000".to_string())).await);
    assert_eq!(delivered.status, OrderStatus::Delivered);
}
