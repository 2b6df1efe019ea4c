use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operator allowed into the cost-entry area.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usuario_custos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "nome")]
    pub name: String,
    /// bcrypt (`$2a$`/`$2b$`/`$2y$`) or argon2 PHC hash.
    #[sea_orm(column_name = "senha")]
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
