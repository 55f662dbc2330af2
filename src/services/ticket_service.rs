use crate::entities::{TicketStatus, ticket_entity as tickets, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::utils::generate_qr_code_hash;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct TicketService {
    pool: DatabaseConnection,
}

impl TicketService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn tickets_for_order(&self, order_id: i64) -> AppResult<Vec<tickets::Model>> {
        Ok(tickets::Entity::find()
            .filter(tickets::Column::OrderId.eq(order_id))
            .order_by_asc(tickets::Column::Id)
            .all(&self.pool)
            .await?)
    }

    /// 检票入场，一张票只能核销一次
    pub async fn check_in(
        &self,
        qr_code_hash: &str,
        staff_id: i64,
        gate: Option<String>,
    ) -> AppResult<tickets::Model> {
        let txn = self.pool.begin().await?;
        let ticket = tickets::Entity::find()
            .filter(tickets::Column::QrCodeHash.eq(qr_code_hash))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket not found".into()))?;

        if ticket.status == TicketStatus::Redeemed {
            return Err(AppError::InvalidState(format!(
                "Ticket {} is already checked in",
                ticket.id
            )));
        }
        if !ticket.status.can_transition_to(TicketStatus::Redeemed) {
            return Err(AppError::InvalidState(format!(
                "Ticket {} is {} and cannot be checked in",
                ticket.id, ticket.status
            )));
        }

        let now = Utc::now();
        let mut am = ticket.into_active_model();
        am.status = Set(TicketStatus::Redeemed);
        am.checked_in_at = Set(Some(now));
        am.checked_in_by = Set(Some(staff_id));
        am.checked_in_gate = Set(gate);
        am.updated_at = Set(now);
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        log::info!("Ticket {} checked in by staff {}", updated.id, staff_id);
        Ok(updated)
    }

    /// 转让门票，旧二维码随之失效
    pub async fn transfer_ticket(
        &self,
        ticket_id: i64,
        from_user_id: i64,
        recipient_email: &str,
    ) -> AppResult<tickets::Model> {
        let email = recipient_email.trim().to_lowercase();
        let txn = self.pool.begin().await?;

        let ticket = tickets::Entity::find_by_id(ticket_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {ticket_id} not found")))?;
        if ticket.holder_id != Some(from_user_id) {
            return Err(AppError::InvalidState(format!(
                "Ticket {ticket_id} is not held by user {from_user_id}"
            )));
        }
        if !ticket.status.is_admissible() {
            return Err(AppError::InvalidState(format!(
                "Ticket {ticket_id} is {} and cannot be transferred",
                ticket.status
            )));
        }

        let recipient = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {email} not found")))?;
        if recipient.id == from_user_id {
            return Err(AppError::ValidationError(
                "Cannot transfer a ticket to yourself".into(),
            ));
        }

        let tier_id = ticket.tier_id;
        let mut am = ticket.into_active_model();
        am.holder_id = Set(Some(recipient.id));
        am.qr_code_hash = Set(generate_qr_code_hash(tier_id, Some(recipient.id)));
        am.updated_at = Set(Utc::now());
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        log::info!(
            "Ticket {} transferred from user {} to user {}",
            updated.id,
            from_user_id,
            recipient.id
        );
        Ok(updated)
    }
}
