pub use sea_orm_migration::prelude::*;

mod m20251006_000001_initial;
mod m20251012_000001_add_lottery_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251006_000001_initial::Migration),
            Box::new(m20251012_000001_add_lottery_entries::Migration),
        ]
    }
}
