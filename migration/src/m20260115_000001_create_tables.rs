use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cinemas::Table)
                    .if_not_exists()
                    .col(pk_auto(Cinemas::Id))
                    .col(string_uniq(Cinemas::NameJp))
                    .col(string(Cinemas::Address).default(""))
                    .col(double(Cinemas::Latitude).default(0.0))
                    .col(double(Cinemas::Longitude).default(0.0))
                    .col(string(Cinemas::BuildingPhoto).default(""))
                    .col(string(Cinemas::Website).default(""))
                    .col(big_integer(Cinemas::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_auto(Movies::Id))
                    .col(integer(Movies::TmdbId).default(0))
                    .col(string(Movies::ImdbId).default(""))
                    .col(string(Movies::TitleCn).default(""))
                    .col(string_uniq(Movies::TitleJp))
                    .col(string(Movies::TitleEn).default(""))
                    .col(string(Movies::Director).default(""))
                    .col(string(Movies::Year).default(""))
                    .col(text(Movies::Synopsis).default(""))
                    .col(string(Movies::Poster).default(""))
                    .col(string(Movies::Backdrop).default(""))
                    .col(integer(Movies::Runtime).default(0))
                    .col(string(Movies::Genre).default(""))
                    .col(text(Movies::CastJson).default(""))
                    .col(double(Movies::TmdbRating).default(0.0))
                    .col(double(Movies::ImdbRating).default(0.0))
                    .col(double(Movies::DoubanRating).default(0.0))
                    .col(string(Movies::Status).default(""))
                    .col(string(Movies::ReleaseDate).default(""))
                    .col(text(Movies::CuratorNote).default(""))
                    .col(big_integer(Movies::CreatedAt))
                    .col(big_integer(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Schedules::Table)
                    .if_not_exists()
                    .col(pk_auto(Schedules::Id))
                    .col(integer(Schedules::MovieId))
                    .col(integer(Schedules::CinemaId))
                    .col(string(Schedules::PlayDate))
                    .col(string(Schedules::StartTime))
                    .col(big_integer(Schedules::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedules_movie")
                            .from(Schedules::Table, Schedules::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedules_cinema")
                            .from(Schedules::Table, Schedules::CinemaId)
                            .to(Cinemas::Table, Cinemas::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_schedules_unique")
                    .table(Schedules::Table)
                    .col(Schedules::MovieId)
                    .col(Schedules::CinemaId)
                    .col(Schedules::PlayDate)
                    .col(Schedules::StartTime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Schedules::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Cinemas::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Cinemas {
    Table,
    Id,
    NameJp,
    Address,
    Latitude,
    Longitude,
    BuildingPhoto,
    Website,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    TmdbId,
    ImdbId,
    TitleCn,
    TitleJp,
    TitleEn,
    Director,
    Year,
    Synopsis,
    Poster,
    Backdrop,
    Runtime,
    Genre,
    CastJson,
    TmdbRating,
    ImdbRating,
    DoubanRating,
    Status,
    ReleaseDate,
    CuratorNote,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Schedules {
    Table,
    Id,
    MovieId,
    CinemaId,
    PlayDate,
    StartTime,
    CreatedAt,
}
