use std::{env, error::Error, time::Duration};

use async_trait::async_trait;
use model::{
    point::GeoPoint,
    run::{Run, RunStats},
    user::User,
    StartRange, WithId,
};
use queries::convert_error;
use run_tracker::{
    config::lock_timeout_from_env,
    database::{
        Database, DatabaseAutocommit, DatabaseTransaction, Result, RunRepo, UserRepo,
    },
};
use sqlx::Transaction;
use utility::id::Id;

pub mod data_model;
pub mod queries;

pub struct DatabaseConnectionInfo {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub lock_timeout: Duration,
}

impl DatabaseConnectionInfo {
    pub fn from_env() -> Option<Self> {
        let username = env::var("DATABASE_USER").ok()?;
        let password = env::var("DATABASE_PASSWORD").ok()?;
        let hostname = env::var("DATABASE_HOST").ok()?;
        let port: u16 = env::var("DATABASE_PORT").ok()?.parse().ok()?;
        let database = env::var("DATABASE_NAME").ok()?;
        Some(Self {
            username,
            password,
            hostname,
            port,
            database,
            lock_timeout: lock_timeout_from_env(),
        })
    }

    pub(self) fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.hostname, self.port, self.database
        )
    }
}

#[derive(Clone)]
pub struct PgDatabase {
    connection: sqlx::PgPool,
    lock_timeout: Duration,
}

pub struct PgDatabaseTransaction<'a> {
    tx: Transaction<'a, sqlx::Postgres>,
    lock_timeout: Duration,
}

#[async_trait]
impl<'a> DatabaseTransaction for PgDatabaseTransaction<'a> {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(convert_error)
    }
}

pub struct PgDatabaseAutocommit {
    pool: sqlx::PgPool,
    lock_timeout: Duration,
}

impl DatabaseAutocommit for PgDatabaseAutocommit {}

impl PgDatabase {
    pub async fn connect(
        database_connection_info: DatabaseConnectionInfo,
    ) -> std::result::Result<Self, Box<dyn Error>> {
        let url = database_connection_info.postgres_url();
        let pool = sqlx::postgres::PgPool::connect(&url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!(
            "connected to database {} on {}:{}",
            database_connection_info.database,
            database_connection_info.hostname,
            database_connection_info.port
        );

        Ok(Self {
            connection: pool,
            lock_timeout: database_connection_info.lock_timeout,
        })
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Transaction = PgDatabaseTransaction<'static>;
    type Autocommit = PgDatabaseAutocommit;

    fn auto(&self) -> Self::Autocommit {
        PgDatabaseAutocommit {
            pool: self.connection.clone(),
            lock_timeout: self.lock_timeout,
        }
    }

    async fn transaction(&self) -> Result<Self::Transaction> {
        let tx: Transaction<'_, sqlx::Postgres> =
            self.connection.begin().await.map_err(convert_error)?;

        Ok(PgDatabaseTransaction {
            tx,
            lock_timeout: self.lock_timeout,
        })
    }
}

#[async_trait]
impl RunRepo for PgDatabaseAutocommit {
    async fn create_run(
        &mut self,
        user_id: Id<User>,
        start_point: GeoPoint,
    ) -> Result<WithId<Run>> {
        queries::run::insert(&self.pool, user_id, start_point).await
    }

    async fn get_run(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        queries::run::get(&self.pool, id).await
    }

    async fn run_for_update(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        let mut connection = self.pool.acquire().await.map_err(convert_error)?;
        queries::run::get_for_update(&mut connection, id, self.lock_timeout).await
    }

    async fn finish_run(
        &mut self,
        id: Id<Run>,
        finish_point: GeoPoint,
        distance: i32,
    ) -> Result<Option<WithId<Run>>> {
        queries::run::finish(&self.pool, id, finish_point, distance).await
    }

    async fn finished_runs_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<Vec<WithId<Run>>> {
        queries::run::finished_by_user(&self.pool, user_id, range).await
    }

    async fn stats_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<RunStats> {
        queries::run::stats_by_user(&self.pool, user_id, range).await
    }
}

#[async_trait]
impl UserRepo for PgDatabaseAutocommit {
    async fn get_user(&mut self, id: Id<User>) -> Result<Option<WithId<User>>> {
        queries::user::get(&self.pool, id).await
    }

    async fn get_users(&mut self) -> Result<Vec<WithId<User>>> {
        queries::user::get_all(&self.pool).await
    }

    async fn create_user(&mut self, user: User) -> Result<WithId<User>> {
        queries::user::insert(&self.pool, user).await
    }

    async fn update_user(&mut self, user: WithId<User>) -> Result<Option<WithId<User>>> {
        queries::user::update(&self.pool, user).await
    }

    async fn delete_user(&mut self, id: Id<User>) -> Result<bool> {
        queries::user::delete(&self.pool, id).await
    }
}

#[async_trait]
impl<'a> RunRepo for PgDatabaseTransaction<'a> {
    async fn create_run(
        &mut self,
        user_id: Id<User>,
        start_point: GeoPoint,
    ) -> Result<WithId<Run>> {
        queries::run::insert(&mut *self.tx, user_id, start_point).await
    }

    async fn get_run(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        queries::run::get(&mut *self.tx, id).await
    }

    async fn run_for_update(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        queries::run::get_for_update(&mut self.tx, id, self.lock_timeout).await
    }

    async fn finish_run(
        &mut self,
        id: Id<Run>,
        finish_point: GeoPoint,
        distance: i32,
    ) -> Result<Option<WithId<Run>>> {
        queries::run::finish(&mut *self.tx, id, finish_point, distance).await
    }

    async fn finished_runs_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<Vec<WithId<Run>>> {
        queries::run::finished_by_user(&mut *self.tx, user_id, range).await
    }

    async fn stats_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<RunStats> {
        queries::run::stats_by_user(&mut *self.tx, user_id, range).await
    }
}

#[async_trait]
impl<'a> UserRepo for PgDatabaseTransaction<'a> {
    async fn get_user(&mut self, id: Id<User>) -> Result<Option<WithId<User>>> {
        queries::user::get(&mut *self.tx, id).await
    }

    async fn get_users(&mut self) -> Result<Vec<WithId<User>>> {
        queries::user::get_all(&mut *self.tx).await
    }

    async fn create_user(&mut self, user: User) -> Result<WithId<User>> {
        queries::user::insert(&mut *self.tx, user).await
    }

    async fn update_user(&mut self, user: WithId<User>) -> Result<Option<WithId<User>>> {
        queries::user::update(&mut *self.tx, user).await
    }

    async fn delete_user(&mut self, id: Id<User>) -> Result<bool> {
        queries::user::delete(&mut *self.tx, id).await
    }
}
