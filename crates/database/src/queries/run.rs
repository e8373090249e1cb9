use std::time::Duration;

use model::{
    point::GeoPoint,
    run::{Run, RunStats},
    user::User,
    StartRange, WithId,
};
use run_tracker::database::{DatabaseError, Result};
use sqlx::{Executor, PgConnection, Postgres};
use utility::{id::Id, let_also::LetAlso};

use crate::data_model::{
    run::{RunRow, RUN_COLUMNS},
    stats::RunStatsRow,
    with_ids, DatabaseRow,
};

use super::convert_error;

pub async fn insert<'c, E>(
    executor: E,
    user_id: Id<User>,
    start_point: GeoPoint,
) -> Result<WithId<Run>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, RunRow>(&format!(
        "
        INSERT INTO runs(
            user_id,
            start_datetime,
            start_latitude,
            start_longitude
        )
        VALUES ($1, $2, $3, $4)
        RETURNING {};
        ",
        RUN_COLUMNS
    ))
    .bind(user_id.raw())
    .bind(start_point.timestamp())
    .bind(start_point.latitude())
    .bind(start_point.longitude())
    .fetch_one(executor)
    .await
    .map_err(convert_error)?
    .let_owned(|row: RunRow| row.to_model().map_err(DatabaseError::from))
}

pub async fn get<'c, E>(executor: E, id: Id<Run>) -> Result<Option<WithId<Run>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, RunRow>(&format!("SELECT {} FROM runs WHERE id = $1;", RUN_COLUMNS))
        .bind(id.raw())
        .fetch_optional(executor)
        .await
        .map_err(convert_error)?
        .map(|row: RunRow| row.to_model())
        .transpose()
        .map_err(DatabaseError::from)
}

/// Locks the row until the surrounding transaction ends. Waiting longer than
/// `lock_timeout` fails with SQLSTATE 55P03.
pub async fn get_for_update(
    connection: &mut PgConnection,
    id: Id<Run>,
    lock_timeout: Duration,
) -> Result<Option<WithId<Run>>> {
    // SET does not take bind parameters
    sqlx::query(&format!(
        "SET LOCAL lock_timeout = '{}ms';",
        lock_timeout.as_millis()
    ))
    .execute(&mut *connection)
    .await
    .map_err(convert_error)?;

    sqlx::query_as::<_, RunRow>(&format!(
        "SELECT {} FROM runs WHERE id = $1 FOR UPDATE;",
        RUN_COLUMNS
    ))
    .bind(id.raw())
    .fetch_optional(&mut *connection)
    .await
    .map_err(convert_error)?
    .map(|row: RunRow| row.to_model())
    .transpose()
    .map_err(DatabaseError::from)
}

pub async fn finish<'c, E>(
    executor: E,
    id: Id<Run>,
    finish_point: GeoPoint,
    distance: i32,
) -> Result<Option<WithId<Run>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, RunRow>(&format!(
        "
        UPDATE runs SET
            finish_datetime = $2,
            finish_latitude = $3,
            finish_longitude = $4,
            distance = $5
        WHERE id = $1
        RETURNING {};
        ",
        RUN_COLUMNS
    ))
    .bind(id.raw())
    .bind(finish_point.timestamp())
    .bind(finish_point.latitude())
    .bind(finish_point.longitude())
    .bind(distance)
    .fetch_optional(executor)
    .await
    .map_err(convert_error)?
    .map(|row: RunRow| row.to_model())
    .transpose()
    .map_err(DatabaseError::from)
}

pub async fn finished_by_user<'c, E>(
    executor: E,
    user_id: Id<User>,
    range: StartRange,
) -> Result<Vec<WithId<Run>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, RunRow>(&format!(
        "
        SELECT {}
        FROM runs
        WHERE user_id = $1
            AND finish_datetime IS NOT NULL
            AND ($2::timestamp IS NULL OR start_datetime >= $2)
            AND ($3::timestamp IS NULL OR start_datetime <= $3)
        ORDER BY start_datetime ASC, id ASC;
        ",
        RUN_COLUMNS
    ))
    .bind(user_id.raw())
    .bind(range.from)
    .bind(range.to)
    .fetch_all(executor)
    .await
    .map_err(convert_error)?
    .let_owned(|rows: Vec<RunRow>| with_ids(rows).map_err(DatabaseError::from))
}

/// Speeds divide by whole elapsed seconds, like `Run::average_speed_kmh`.
pub async fn stats_by_user<'c, E>(
    executor: E,
    user_id: Id<User>,
    range: StartRange,
) -> Result<RunStats>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, RunStatsRow>(
        "
        WITH finished AS (
            SELECT
                distance,
                EXTRACT(EPOCH FROM (finish_datetime - start_datetime))::numeric AS seconds
            FROM runs
            WHERE user_id = $1
                AND finish_datetime IS NOT NULL
                AND ($2::timestamp IS NULL OR start_datetime >= $2)
                AND ($3::timestamp IS NULL OR start_datetime <= $3)
        )
        SELECT
            COUNT(*) AS count,
            SUM(distance)::bigint AS distance,
            ROUND(
                AVG(
                    distance::numeric
                    / CASE WHEN seconds >= 1 THEN TRUNC(seconds) ELSE seconds END
                ) * 3.6,
                10
            ) AS mean_speed_kmh
        FROM finished;
        ",
    )
    .bind(user_id.raw())
    .bind(range.from)
    .bind(range.to)
    .fetch_one(executor)
    .await
    .map_err(convert_error)
    .map(|row: RunStatsRow| row.to_model())
}
