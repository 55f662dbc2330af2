use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    DisplayName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    Name,
    StartsAt,
    LotteryEnabled,
    AllowsLayaway,
    LotteryDrawDate,
    CreatedAt,
}

/// 票档 (sellable tier). remaining_quantity is the live inventory counter.
#[derive(DeriveIden)]
enum TicketTiers {
    Table,
    Id,
    EventId,
    Name,
    Price,
    TicketsPerUnit,
    InitialQuantity,
    RemainingQuantity,
    MaxQtyPerOrder,
    SalesStart,
    SalesEnd,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    UserId,
    EventId,
    Subtotal,
    DiscountAmount,
    DiscountId,
    TotalAmount,
    AmountPaid,
    PaymentStatus,
    PaymentType,
    LayawayDeadline,
    PaymentProvider,
    ProviderRef,
    ProviderTransactionId,
    PaymentMetadata,
    FailureReason,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    EventId,
    TierId,
    OrderId,
    PurchaserId,
    HolderId,
    TicketType,
    Status,
    QrCodeHash,
    CheckedInAt,
    CheckedInBy,
    CheckedInGate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PartialPayments {
    Table,
    Id,
    OrderId,
    Amount,
    Status,
    Provider,
    TransactionRef,
    ProviderTransactionId,
    FailureReason,
    CompletedAt,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn id_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn created_at_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(&mut id_col(Users::Id))
                    .col(ColumnDef::new(Users::Email).string_len(255).not_null())
                    .col(ColumnDef::new(Users::DisplayName).string_len(255).null())
                    .col(&mut created_at_col(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_email_unique")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(&mut id_col(Events::Id))
                    .col(ColumnDef::new(Events::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Events::StartsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::LotteryEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Events::AllowsLayaway)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Events::LotteryDrawDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(&mut created_at_col(Events::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TicketTiers::Table)
                    .if_not_exists()
                    .col(&mut id_col(TicketTiers::Id))
                    .col(ColumnDef::new(TicketTiers::EventId).big_integer().not_null())
                    .col(ColumnDef::new(TicketTiers::Name).string_len(255).not_null())
                    .col(ColumnDef::new(TicketTiers::Price).big_integer().not_null())
                    .col(
                        ColumnDef::new(TicketTiers::TicketsPerUnit)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(TicketTiers::InitialQuantity)
                            .integer()
                            .not_null(),
                    )
                    // 剩余库存不允许为负，即使应用层校验被绕过
                    .col(
                        ColumnDef::new(TicketTiers::RemainingQuantity)
                            .integer()
                            .not_null()
                            .check(Expr::col(TicketTiers::RemainingQuantity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(TicketTiers::MaxQtyPerOrder)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(TicketTiers::SalesStart)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TicketTiers::SalesEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TicketTiers::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(&mut created_at_col(TicketTiers::CreatedAt))
                    .col(&mut created_at_col(TicketTiers::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_tiers_event")
                            .from(TicketTiers::Table, TicketTiers::EventId)
                            .to(Events::Table, Events::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(&mut id_col(Orders::Id))
                    .col(ColumnDef::new(Orders::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::EventId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Subtotal).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::DiscountAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Orders::DiscountId).big_integer().null())
                    .col(ColumnDef::new(Orders::TotalAmount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::AmountPaid)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Orders::PaymentStatus).string_len(16).not_null())
                    .col(ColumnDef::new(Orders::PaymentType).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Orders::LayawayDeadline)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::PaymentProvider).string_len(64).not_null())
                    .col(ColumnDef::new(Orders::ProviderRef).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Orders::ProviderTransactionId)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::PaymentMetadata).text().null())
                    .col(ColumnDef::new(Orders::FailureReason).string_len(255).null())
                    .col(ColumnDef::new(Orders::PaidAt).timestamp_with_time_zone().null())
                    .col(&mut created_at_col(Orders::CreatedAt))
                    .col(&mut created_at_col(Orders::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_user")
                            .from(Orders::Table, Orders::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_event")
                            .from(Orders::Table, Orders::EventId)
                            .to(Events::Table, Events::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_provider_ref_unique")
                    .table(Orders::Table)
                    .col(Orders::ProviderRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 过期扫描按 (payment_status, created_at) 查询
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_status_created_at")
                    .table(Orders::Table)
                    .col(Orders::PaymentStatus)
                    .col(Orders::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(&mut id_col(Tickets::Id))
                    .col(ColumnDef::new(Tickets::EventId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::TierId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::OrderId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::PurchaserId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::HolderId).big_integer().null())
                    .col(ColumnDef::new(Tickets::TicketType).string_len(16).not_null())
                    .col(ColumnDef::new(Tickets::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Tickets::QrCodeHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Tickets::CheckedInAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Tickets::CheckedInBy).big_integer().null())
                    .col(ColumnDef::new(Tickets::CheckedInGate).string_len(64).null())
                    .col(&mut created_at_col(Tickets::CreatedAt))
                    .col(&mut created_at_col(Tickets::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_tier")
                            .from(Tickets::Table, Tickets::TierId)
                            .to(TicketTiers::Table, TicketTiers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_order")
                            .from(Tickets::Table, Tickets::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_qr_code_hash_unique")
                    .table(Tickets::Table)
                    .col(Tickets::QrCodeHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_event_status")
                    .table(Tickets::Table)
                    .col(Tickets::EventId)
                    .col(Tickets::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_order")
                    .table(Tickets::Table)
                    .col(Tickets::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PartialPayments::Table)
                    .if_not_exists()
                    .col(&mut id_col(PartialPayments::Id))
                    .col(
                        ColumnDef::new(PartialPayments::OrderId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PartialPayments::Amount).big_integer().not_null())
                    .col(ColumnDef::new(PartialPayments::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(PartialPayments::Provider)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PartialPayments::TransactionRef)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PartialPayments::ProviderTransactionId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PartialPayments::FailureReason)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PartialPayments::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(&mut created_at_col(PartialPayments::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_partial_payments_order")
                            .from(PartialPayments::Table, PartialPayments::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_partial_payments_transaction_ref_unique")
                    .table(PartialPayments::Table)
                    .col(PartialPayments::TransactionRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PartialPayments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tickets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TicketTiers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
