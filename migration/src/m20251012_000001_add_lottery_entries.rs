use sea_orm_migration::prelude::*;

/// Lottery Entries (用户报名抽签)
#[derive(DeriveIden)]
enum LotteryEntries {
    Table,
    Id,
    EventId,
    UserId,
    IsWinner,
    WonAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LotteryEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LotteryEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LotteryEntries::EventId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LotteryEntries::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LotteryEntries::IsWinner)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LotteryEntries::WonAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LotteryEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lottery_entries_event")
                            .from(LotteryEntries::Table, LotteryEntries::EventId)
                            .to(Events::Table, Events::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lottery_entries_user")
                            .from(LotteryEntries::Table, LotteryEntries::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一活动每个用户仅一条报名
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lottery_entries_event_user_unique")
                    .table(LotteryEntries::Table)
                    .col(LotteryEntries::EventId)
                    .col(LotteryEntries::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LotteryEntries::Table).to_owned())
            .await
    }
}
