#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use ticketing_engine::config::{LayawayConfig, ReservationConfig};
use ticketing_engine::entities::{
    event_entity as events, order_entity as orders, ticket_entity as tickets,
    ticket_tier_entity as tiers, user_entity as users,
};
use ticketing_engine::external::{NoDiscounts, NotificationService};
use ticketing_engine::services::{
    CheckoutService, ExpiryService, LayawayService, LotteryService, SettlementService,
    TicketService,
};

/// 单连接内存库：每个测试独立，连接池串行化所有事务
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(StdDuration::from_secs(30))
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn seed_user(db: &DatabaseConnection, email: &str) -> users::Model {
    users::ActiveModel {
        email: Set(email.to_string()),
        display_name: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub struct EventOptions {
    pub lottery_enabled: bool,
    pub allows_layaway: bool,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            lottery_enabled: false,
            allows_layaway: false,
        }
    }
}

pub async fn seed_event(db: &DatabaseConnection, options: EventOptions) -> events::Model {
    let now = Utc::now();
    events::ActiveModel {
        name: Set("Harbor Lights Festival".to_string()),
        starts_at: Set(now + Duration::days(60)),
        lottery_enabled: Set(options.lottery_enabled),
        allows_layaway: Set(options.allows_layaway),
        lottery_draw_date: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub struct NewTier {
    pub name: &'static str,
    pub price: i64,
    pub tickets_per_unit: i32,
    pub quantity: i32,
    pub max_qty_per_order: i32,
}

impl Default for NewTier {
    fn default() -> Self {
        Self {
            name: "General Admission",
            price: 5000,
            tickets_per_unit: 1,
            quantity: 100,
            max_qty_per_order: 10,
        }
    }
}

pub async fn seed_tier(db: &DatabaseConnection, event_id: i64, tier: NewTier) -> tiers::Model {
    let now = Utc::now();
    tiers::ActiveModel {
        event_id: Set(event_id),
        name: Set(tier.name.to_string()),
        price: Set(tier.price),
        tickets_per_unit: Set(tier.tickets_per_unit),
        initial_quantity: Set(tier.quantity),
        remaining_quantity: Set(tier.quantity),
        max_qty_per_order: Set(tier.max_qty_per_order),
        sales_start: Set(None),
        sales_end: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn remaining(db: &DatabaseConnection, tier_id: i64) -> i32 {
    tiers::Entity::find_by_id(tier_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .remaining_quantity
}

pub async fn reload_order(db: &DatabaseConnection, order_id: i64) -> orders::Model {
    orders::Entity::find_by_id(order_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

pub async fn order_tickets(db: &DatabaseConnection, order_id: i64) -> Vec<tickets::Model> {
    tickets::Entity::find()
        .filter(tickets::Column::OrderId.eq(order_id))
        .order_by_asc(tickets::Column::Id)
        .all(db)
        .await
        .unwrap()
}

/// 把订单创建时间往前挪，模拟预留已超时
pub async fn backdate_order(db: &DatabaseConnection, order_id: i64, created_at: DateTime<Utc>) {
    orders::Entity::update_many()
        .col_expr(orders::Column::CreatedAt, Expr::value(created_at))
        .filter(orders::Column::Id.eq(order_id))
        .exec(db)
        .await
        .unwrap();
}

pub fn checkout_service(db: &DatabaseConnection) -> CheckoutService {
    CheckoutService::new(
        db.clone(),
        Arc::new(NoDiscounts),
        NotificationService::disabled(),
    )
}

pub fn settlement_service(db: &DatabaseConnection) -> SettlementService {
    SettlementService::new(db.clone(), NotificationService::disabled())
}

pub fn layaway_service(db: &DatabaseConnection) -> LayawayService {
    LayawayService::new(db.clone(), LayawayConfig::default())
}

pub fn expiry_service(db: &DatabaseConnection) -> ExpiryService {
    ExpiryService::new(db.clone(), &ReservationConfig::default())
}

pub fn lottery_service(db: &DatabaseConnection) -> LotteryService {
    LotteryService::new(db.clone())
}

pub fn ticket_service(db: &DatabaseConnection) -> TicketService {
    TicketService::new(db.clone())
}
