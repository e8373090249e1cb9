use chrono::NaiveDate;
use model::{user::User, WithId};
use sqlx::prelude::FromRow;
use utility::id::Id;

use super::{DatabaseRow, Result};

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub sex: String,
}

impl DatabaseRow for UserRow {
    type Model = User;

    fn to_model(self) -> Result<WithId<User>> {
        let user = User::new(
            self.first_name,
            self.last_name,
            self.birth_date,
            self.sex.parse()?,
        )?;
        Ok(WithId::new(Id::new(self.id), user))
    }
}
