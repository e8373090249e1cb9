use std::{error, result};

use async_trait::async_trait;
use model::{
    point::GeoPoint,
    run::{Run, RunStats},
    user::User,
    ModelError, StartRange, WithId,
};
use thiserror::Error;
use utility::id::Id;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("not found")]
    NotFound,
    #[error("timed out waiting for a row lock")]
    LockTimeout,
    #[error("database unavailable: {0}")]
    Unavailable(Box<dyn error::Error + Send + Sync>),
    #[error("stored data is invalid: {0}")]
    Corrupt(#[from] ModelError),
    #[error(transparent)]
    Other(Box<dyn error::Error + Send + Sync>),
}

impl DatabaseError {
    /// Whether repeating the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout | Self::Unavailable(_))
    }
}

pub type Result<T> = result::Result<T, DatabaseError>;

#[async_trait]
pub trait RunRepo {
    /// Stores a new run in the started state and assigns its id.
    async fn create_run(
        &mut self,
        user_id: Id<User>,
        start_point: GeoPoint,
    ) -> Result<WithId<Run>>;

    async fn get_run(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>>;

    /// Returns the current state of the run and locks it exclusively until the
    /// enclosing transaction is committed or dropped. Waiting for a lock held
    /// elsewhere fails with [`DatabaseError::LockTimeout`] once the configured
    /// lock timeout passes.
    ///
    /// Outside a transaction the lock only lives for the call itself.
    async fn run_for_update(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>>;

    /// Writes finish point and distance in a single update. `None` if the run
    /// does not exist (anymore).
    async fn finish_run(
        &mut self,
        id: Id<Run>,
        finish_point: GeoPoint,
        distance: i32,
    ) -> Result<Option<WithId<Run>>>;

    /// Finished runs of the user whose start lies in `range`, ordered by start
    /// datetime.
    async fn finished_runs_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<Vec<WithId<Run>>>;

    async fn stats_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<RunStats>;
}

#[async_trait]
pub trait UserRepo {
    async fn get_user(&mut self, id: Id<User>) -> Result<Option<WithId<User>>>;

    /// All users ordered by last name, then first name.
    async fn get_users(&mut self) -> Result<Vec<WithId<User>>>;

    async fn create_user(&mut self, user: User) -> Result<WithId<User>>;

    async fn update_user(&mut self, user: WithId<User>) -> Result<Option<WithId<User>>>;

    /// Deletes the user together with all of their runs.
    async fn delete_user(&mut self, id: Id<User>) -> Result<bool>;
}

pub trait DatabaseOperations: RunRepo + UserRepo {}

impl<T> DatabaseOperations for T where T: RunRepo + UserRepo {}

/// A unit of work. Dropping a transaction without committing it rolls back
/// its writes and releases every lock acquired through it.
#[async_trait]
pub trait DatabaseTransaction: DatabaseOperations {
    async fn commit(self) -> Result<()>;
}

pub trait DatabaseAutocommit: DatabaseOperations {}

/// trait to implement a run store.
/// multiple concurrent accesses should be possible by e.g. cloning the database object.
#[async_trait]
pub trait Database: Clone + Send + Sync + Sized {
    type Transaction: DatabaseTransaction + Send;
    type Autocommit: DatabaseAutocommit + Send;

    async fn transaction(&self) -> Result<Self::Transaction>;

    fn auto(&self) -> Self::Autocommit;
}
