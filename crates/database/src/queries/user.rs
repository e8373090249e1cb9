use model::{user::User, WithId};
use run_tracker::database::{DatabaseError, Result};
use sqlx::{Executor, Postgres};
use utility::{id::Id, let_also::LetAlso};

use crate::data_model::{user::UserRow, with_ids, DatabaseRow};

use super::convert_error;

pub async fn get<'c, E>(executor: E, id: Id<User>) -> Result<Option<WithId<User>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, UserRow>(
        "
        SELECT id, first_name, last_name, birth_date, sex
        FROM users
        WHERE id = $1;
        ",
    )
    .bind(id.raw())
    .fetch_optional(executor)
    .await
    .map_err(convert_error)?
    .map(|row: UserRow| row.to_model())
    .transpose()
    .map_err(DatabaseError::from)
}

pub async fn get_all<'c, E>(executor: E) -> Result<Vec<WithId<User>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, UserRow>(
        "
        SELECT id, first_name, last_name, birth_date, sex
        FROM users
        ORDER BY last_name ASC, first_name ASC, id ASC;
        ",
    )
    .fetch_all(executor)
    .await
    .map_err(convert_error)?
    .let_owned(|rows: Vec<UserRow>| with_ids(rows).map_err(DatabaseError::from))
}

pub async fn insert<'c, E>(executor: E, user: User) -> Result<WithId<User>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, UserRow>(
        "
        INSERT INTO users(
            first_name,
            last_name,
            birth_date,
            sex
        )
        VALUES ($1, $2, $3, $4)
        RETURNING id, first_name, last_name, birth_date, sex;
        ",
    )
    .bind(user.first_name())
    .bind(user.last_name())
    .bind(user.birth_date())
    .bind(user.sex().as_str())
    .fetch_one(executor)
    .await
    .map_err(convert_error)?
    .let_owned(|row: UserRow| row.to_model().map_err(DatabaseError::from))
}

pub async fn update<'c, E>(executor: E, user: WithId<User>) -> Result<Option<WithId<User>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, UserRow>(
        "
        UPDATE users SET
            first_name = $2,
            last_name = $3,
            birth_date = $4,
            sex = $5
        WHERE id = $1
        RETURNING id, first_name, last_name, birth_date, sex;
        ",
    )
    .bind(user.id.raw())
    .bind(user.content.first_name())
    .bind(user.content.last_name())
    .bind(user.content.birth_date())
    .bind(user.content.sex().as_str())
    .fetch_optional(executor)
    .await
    .map_err(convert_error)?
    .map(|row: UserRow| row.to_model())
    .transpose()
    .map_err(DatabaseError::from)
}

/// Runs of the user go with it (`ON DELETE CASCADE`).
pub async fn delete<'c, E>(executor: E, id: Id<User>) -> Result<bool>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query("DELETE FROM users WHERE id = $1;")
        .bind(id.raw())
        .execute(executor)
        .await
        .map_err(convert_error)
        .map(|result| result.rows_affected() > 0)
}
