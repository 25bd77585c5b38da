use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_schedules_movie")
                    .table(Schedules::Table)
                    .col(Schedules::MovieId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_schedules_cinema_date")
                    .table(Schedules::Table)
                    .col(Schedules::CinemaId)
                    .col(Schedules::PlayDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop().name("idx_schedules_cinema_date").table(Schedules::Table).to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop().name("idx_schedules_movie").table(Schedules::Table).to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Schedules {
    Table,
    MovieId,
    CinemaId,
    PlayDate,
}
