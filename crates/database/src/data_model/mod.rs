use model::{ModelError, WithId};
use utility::id::HasId;

pub mod run;
pub mod stats;
pub mod user;

pub type Result<O> = core::result::Result<O, ModelError>;

/// A row that converts into a validated model value.
pub trait DatabaseRow {
    type Model: HasId<IdType = i64>;

    fn to_model(self) -> Result<WithId<Self::Model>>;
}

pub fn with_ids<R: DatabaseRow>(rows: Vec<R>) -> Result<Vec<WithId<R::Model>>> {
    rows.into_iter().map(DatabaseRow::to_model).collect()
}
