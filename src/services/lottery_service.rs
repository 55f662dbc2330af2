use crate::entities::{
    TicketStatus, event_entity as events, lottery_entry_entity as entries,
    ticket_entity as tickets, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{DrawAssignment, DrawOutcome, ManualAllocationRequest};
use crate::utils::{fisher_yates_shuffle, generate_qr_code_hash};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// 捐赠票抽签
///
/// 抽签与手动分配都先锁定活动行，同一活动上的两条路径互斥，
/// 手动分配不会在抽签进行中拿走池中的票。
#[derive(Clone)]
pub struct LotteryService {
    pool: DatabaseConnection,
}

impl LotteryService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 报名抽签，每个活动每人一次
    pub async fn enter_lottery(&self, event_id: i64, user_id: i64) -> AppResult<entries::Model> {
        let event = events::Entity::find_by_id(event_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;
        if !event.lottery_enabled {
            return Err(AppError::InvalidState(format!(
                "{} does not run a ticket lottery",
                event.name
            )));
        }

        if find_entry(&self.pool, event_id, user_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "User {user_id} has already entered the lottery for event {event_id}"
            )));
        }

        let entry = entries::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            is_winner: Set(false),
            won_at: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_insert(
                e,
                format!("User {user_id} has already entered the lottery for event {event_id}"),
            )
        })?;

        Ok(entry)
    }

    /// 退出抽签，仅限尚未中签
    pub async fn leave_lottery(&self, event_id: i64, user_id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let entry = entries::Entity::find()
            .filter(entries::Column::EventId.eq(event_id))
            .filter(entries::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No lottery entry for user {user_id} in event {event_id}"
                ))
            })?;

        if entry.is_winner {
            return Err(AppError::InvalidState(
                "Winning entries cannot be withdrawn".into(),
            ));
        }

        entry.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// 执行抽签
    pub async fn run_draw(&self, event_id: i64) -> AppResult<DrawOutcome> {
        let mut rng = StdRng::from_entropy();
        self.run_draw_with_rng(event_id, &mut rng).await
    }

    /// 执行抽签 (可注入随机源)
    ///
    /// 逻辑:
    /// 1. 锁定活动、该活动全部 POOL 门票与未中签报名
    /// 2. 任一集合为空则报错，不执行抽签
    /// 3. Fisher–Yates 打乱报名顺序，按 min(票数, 人数) 两两配对
    /// 4. 门票 -> WON 并换持票人 (重新生成二维码)，报名 -> is_winner
    /// 5. 回写活动抽签时间
    ///
    /// 整个过程在一个事务内，要么全部生效要么全部不生效。
    pub async fn run_draw_with_rng<R: Rng + Send>(
        &self,
        event_id: i64,
        rng: &mut R,
    ) -> AppResult<DrawOutcome> {
        let txn = self.pool.begin().await?;

        let event = lock_event(&txn, event_id).await?;
        if !event.lottery_enabled {
            return Err(AppError::InvalidState(format!(
                "{} does not run a ticket lottery",
                event.name
            )));
        }

        let pool_tickets = tickets::Entity::find()
            .filter(tickets::Column::EventId.eq(event_id))
            .filter(tickets::Column::Status.eq(TicketStatus::Pool))
            .order_by_asc(tickets::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await?;
        let mut entrants = entries::Entity::find()
            .filter(entries::Column::EventId.eq(event_id))
            .filter(entries::Column::IsWinner.eq(false))
            .order_by_asc(entries::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await?;

        if pool_tickets.is_empty() {
            return Err(AppError::InvalidState(
                "No pool tickets available for the draw".into(),
            ));
        }
        if entrants.is_empty() {
            return Err(AppError::InvalidState("No entrants for the draw".into()));
        }

        fisher_yates_shuffle(&mut entrants, rng);

        let now = Utc::now();
        let winners = pool_tickets.len().min(entrants.len());
        let mut assignments = Vec::with_capacity(winners);
        for (ticket, entry) in pool_tickets.iter().zip(entrants.iter()) {
            assign_ticket(&txn, ticket, entry.user_id, now).await?;
            mark_winner(&txn, entry.clone(), now).await?;
            assignments.push(DrawAssignment {
                ticket_id: ticket.id,
                user_id: entry.user_id,
            });
        }

        let mut am = event.into_active_model();
        am.lottery_draw_date = Set(Some(now));
        am.update(&txn).await?;

        txn.commit().await?;

        let outcome = DrawOutcome {
            event_id,
            drawn_at: now,
            tickets_remaining_in_pool: pool_tickets.len() - winners,
            entrants_not_drawn: entrants.len() - winners,
            assignments,
        };
        log::info!(
            "Lottery draw for event {event_id}: {} winners, {} tickets left in pool, {} entrants not drawn",
            outcome.winners(),
            outcome.tickets_remaining_in_pool,
            outcome.entrants_not_drawn
        );
        Ok(outcome)
    }

    /// 手动把一张池中票分配给指定邮箱的用户 (推广赠票)
    pub async fn allocate_ticket(
        &self,
        request: ManualAllocationRequest,
    ) -> AppResult<(tickets::Model, entries::Model)> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::ValidationError("Email is required".into()));
        }

        let txn = self.pool.begin().await?;

        lock_event(&txn, request.event_id).await?;

        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {email} not found")))?;

        let ticket = tickets::Entity::find_by_id(request.ticket_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .filter(|t| t.event_id == request.event_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Ticket {} not found for event {}",
                    request.ticket_id, request.event_id
                ))
            })?;
        if ticket.status != TicketStatus::Pool {
            return Err(AppError::InvalidState(format!(
                "Ticket {} is {} and not in the lottery pool",
                ticket.id, ticket.status
            )));
        }

        let now = Utc::now();
        let entry = match entries::Entity::find()
            .filter(entries::Column::EventId.eq(request.event_id))
            .filter(entries::Column::UserId.eq(user.id))
            .lock_exclusive()
            .one(&txn)
            .await?
        {
            Some(entry) if entry.is_winner => {
                return Err(AppError::InvalidState(format!(
                    "{email} has already won a ticket for this event"
                )));
            }
            Some(entry) => mark_winner(&txn, entry, now).await?,
            None => {
                entries::ActiveModel {
                    event_id: Set(request.event_id),
                    user_id: Set(user.id),
                    is_winner: Set(true),
                    won_at: Set(Some(now)),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        let ticket = assign_ticket(&txn, &ticket, user.id, now).await?;
        txn.commit().await?;

        log::info!(
            "Ticket {} manually allocated to user {} for event {}",
            ticket.id,
            user.id,
            request.event_id
        );
        Ok((ticket, entry))
    }
}

async fn lock_event<C: ConnectionTrait>(conn: &C, event_id: i64) -> AppResult<events::Model> {
    events::Entity::find_by_id(event_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))
}

async fn find_entry<C: ConnectionTrait>(
    conn: &C,
    event_id: i64,
    user_id: i64,
) -> AppResult<Option<entries::Model>> {
    Ok(entries::Entity::find()
        .filter(entries::Column::EventId.eq(event_id))
        .filter(entries::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

/// POOL -> WON，持票人变更后重新生成二维码
async fn assign_ticket<C: ConnectionTrait>(
    conn: &C,
    ticket: &tickets::Model,
    user_id: i64,
    now: DateTime<Utc>,
) -> AppResult<tickets::Model> {
    let result = tickets::Entity::update_many()
        .col_expr(tickets::Column::HolderId, Expr::value(user_id))
        .col_expr(tickets::Column::Status, Expr::value(TicketStatus::Won))
        .col_expr(
            tickets::Column::QrCodeHash,
            Expr::value(generate_qr_code_hash(ticket.tier_id, Some(user_id))),
        )
        .col_expr(tickets::Column::UpdatedAt, Expr::value(now))
        .filter(tickets::Column::Id.eq(ticket.id))
        .filter(tickets::Column::Status.eq(TicketStatus::Pool))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(AppError::InvalidState(format!(
            "Ticket {} left the lottery pool during assignment",
            ticket.id
        )));
    }

    tickets::Entity::find_by_id(ticket.id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", ticket.id)))
}

async fn mark_winner<C: ConnectionTrait>(
    conn: &C,
    entry: entries::Model,
    now: DateTime<Utc>,
) -> AppResult<entries::Model> {
    let mut am = entry.into_active_model();
    am.is_winner = Set(true);
    am.won_at = Set(Some(now));
    Ok(am.update(conn).await?)
}
