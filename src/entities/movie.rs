use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tmdb_id: i32,
    pub imdb_id: String,
    pub title_cn: String,
    #[sea_orm(unique)]
    pub title_jp: String,
    pub title_en: String,
    pub director: String,
    pub year: String,
    pub synopsis: String,
    pub poster: String,
    pub backdrop: String,
    pub runtime: i32,
    pub genre: String,
    /// JSON array of `{name, role, img}`.
    pub cast_json: String,
    pub tmdb_rating: f64,
    pub imdb_rating: f64,
    pub douban_rating: f64,
    pub status: String,
    /// `YYYY-MM-DD`, empty when unknown.
    pub release_date: String,
    pub curator_note: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::schedule::Entity")]
    Schedule,
}

impl Related<super::schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
