//! In-process store with the same locking behaviour as the postgres one.
//! Used for tests and for running the service without a database.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{self, Arc, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use model::{
    point::GeoPoint,
    run::{Run, RunStats},
    user::User,
    StartRange, WithId,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use utility::id::Id;

use crate::{
    config::DEFAULT_LOCK_TIMEOUT,
    database::{
        Database, DatabaseAutocommit, DatabaseError, DatabaseTransaction, Result,
        RunRepo, UserRepo,
    },
};

#[derive(Debug, Default)]
struct Tables {
    next_run_id: i64,
    next_user_id: i64,
    runs: BTreeMap<i64, Run>,
    users: BTreeMap<i64, User>,
}

impl Tables {
    fn run_id(&mut self) -> i64 {
        self.next_run_id += 1;
        self.next_run_id
    }

    fn user_id(&mut self) -> i64 {
        self.next_user_id += 1;
        self.next_user_id
    }
}

type RowLock = Arc<Mutex<()>>;

/// Row locks by run id. An entry only lives while a transaction holds or waits
/// for it.
type LockTable = sync::Mutex<HashMap<i64, RowLock>>;

#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    tables: Arc<RwLock<Tables>>,
    run_locks: Arc<LockTable>,
    lock_timeout: Duration,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            run_locks: Arc::new(LockTable::default()),
            lock_timeout,
        }
    }

    fn begin(&self) -> MemoryTransaction {
        MemoryTransaction {
            database: self.clone(),
            held: HashMap::new(),
            runs: BTreeMap::new(),
            users: BTreeMap::new(),
        }
    }

    fn run_lock(&self, id: i64) -> RowLock {
        self.run_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the locks that only the table itself still refers to.
    fn prune_run_locks(&self) {
        self.run_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    fn run_lock_count(&self) -> usize {
        self.run_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Writes are staged and only become visible to others on commit. Row locks
/// are held until the transaction is committed or dropped.
pub struct MemoryTransaction {
    database: MemoryDatabase,
    held: HashMap<i64, OwnedMutexGuard<()>>,
    runs: BTreeMap<i64, Run>,
    /// `None` marks a deleted user.
    users: BTreeMap<i64, Option<User>>,
}

impl MemoryTransaction {
    async fn current_run(&self, id: i64) -> Option<Run> {
        if let Some(run) = self.runs.get(&id) {
            return Some(run.clone());
        }
        self.database.tables.read().await.runs.get(&id).cloned()
    }

    async fn current_user(&self, id: i64) -> Option<User> {
        if let Some(user) = self.users.get(&id) {
            return user.clone();
        }
        self.database.tables.read().await.users.get(&id).cloned()
    }

    /// Committed runs merged with the ones written in this transaction.
    async fn visible_runs(&self) -> BTreeMap<i64, Run> {
        let mut runs = self.database.tables.read().await.runs.clone();
        runs.extend(self.runs.iter().map(|(id, run)| (*id, run.clone())));
        runs
    }

    async fn lock_run(&mut self, id: i64) -> Result<()> {
        if self.held.contains_key(&id) {
            return Ok(());
        }
        let lock = self.database.run_lock(id);
        let guard = tokio::time::timeout(self.database.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                log::warn!("timed out waiting for the lock on run {}", id);
                DatabaseError::LockTimeout
            })?;
        self.held.insert(id, guard);
        Ok(())
    }

    fn release_run(&mut self, id: i64) {
        if self.held.remove(&id).is_some() {
            self.database.prune_run_locks();
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.held.clear();
        self.database.prune_run_locks();
    }
}

#[async_trait]
impl RunRepo for MemoryTransaction {
    async fn create_run(
        &mut self,
        user_id: Id<User>,
        start_point: GeoPoint,
    ) -> Result<WithId<Run>> {
        // ids are never handed out twice, even if this transaction is dropped
        let id = self.database.tables.write().await.run_id();
        let run = Run::started(user_id, start_point);
        self.runs.insert(id, run.clone());
        Ok(WithId::new(Id::new(id), run))
    }

    async fn get_run(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        Ok(self
            .current_run(id.raw())
            .await
            .map(|run| WithId::new(id, run)))
    }

    async fn run_for_update(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        self.lock_run(id.raw()).await?;
        match self.current_run(id.raw()).await {
            Some(run) => Ok(Some(WithId::new(id, run))),
            None => {
                self.release_run(id.raw());
                Ok(None)
            }
        }
    }

    async fn finish_run(
        &mut self,
        id: Id<Run>,
        finish_point: GeoPoint,
        distance: i32,
    ) -> Result<Option<WithId<Run>>> {
        let Some(current) = self.current_run(id.raw()).await else {
            return Ok(None);
        };
        let finished = Run::restore(
            current.user_id(),
            current.start_point().clone(),
            Some(finish_point),
            Some(distance),
        )?;
        self.runs.insert(id.raw(), finished.clone());
        Ok(Some(WithId::new(id, finished)))
    }

    async fn finished_runs_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<Vec<WithId<Run>>> {
        let mut runs: Vec<WithId<Run>> = self
            .visible_runs()
            .await
            .into_iter()
            .filter(|(_, run)| {
                run.user_id() == user_id
                    && run.is_finished()
                    && range.contains(&run.start_point().timestamp())
            })
            .map(|(id, run)| WithId::new(Id::new(id), run))
            .collect();
        runs.sort_by_key(|run| (run.content.start_point().timestamp(), run.id.raw()));
        Ok(runs)
    }

    async fn stats_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<RunStats> {
        let runs = self.finished_runs_by_user(user_id, range).await?;
        Ok(RunStats::from_runs(runs.iter().map(|run| &run.content)))
    }
}

#[async_trait]
impl UserRepo for MemoryTransaction {
    async fn get_user(&mut self, id: Id<User>) -> Result<Option<WithId<User>>> {
        Ok(self
            .current_user(id.raw())
            .await
            .map(|user| WithId::new(id, user)))
    }

    async fn get_users(&mut self) -> Result<Vec<WithId<User>>> {
        let mut users = self.database.tables.read().await.users.clone();
        for (id, user) in &self.users {
            match user {
                Some(user) => users.insert(*id, user.clone()),
                None => users.remove(id),
            };
        }
        let mut users: Vec<WithId<User>> = users
            .into_iter()
            .map(|(id, user)| WithId::new(Id::new(id), user))
            .collect();
        users.sort_by(|a, b| {
            a.content
                .sort_key()
                .cmp(&b.content.sort_key())
                .then(a.id.raw().cmp(&b.id.raw()))
        });
        Ok(users)
    }

    async fn create_user(&mut self, user: User) -> Result<WithId<User>> {
        let id = self.database.tables.write().await.user_id();
        self.users.insert(id, Some(user.clone()));
        Ok(WithId::new(Id::new(id), user))
    }

    async fn update_user(&mut self, user: WithId<User>) -> Result<Option<WithId<User>>> {
        if self.current_user(user.id.raw()).await.is_none() {
            return Ok(None);
        }
        self.users.insert(user.id.raw(), Some(user.content.clone()));
        Ok(Some(user))
    }

    async fn delete_user(&mut self, id: Id<User>) -> Result<bool> {
        if self.current_user(id.raw()).await.is_none() {
            return Ok(false);
        }
        self.users.insert(id.raw(), None);
        self.runs.retain(|_, run| run.user_id() != id);
        Ok(true)
    }
}

#[async_trait]
impl DatabaseTransaction for MemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        let mut tables = self.database.tables.write().await;
        for (id, user) in std::mem::take(&mut self.users) {
            match user {
                Some(user) => {
                    tables.users.insert(id, user);
                }
                None => {
                    tables.users.remove(&id);
                    tables.runs.retain(|_, run| run.user_id().raw() != id);
                }
            }
        }
        for (id, run) in std::mem::take(&mut self.runs) {
            // the owner may have been deleted in the meantime
            if tables.users.contains_key(&run.user_id().raw()) {
                tables.runs.insert(id, run);
            }
        }
        drop(tables);
        Ok(())
    }
}

/// Runs every operation in its own transaction.
#[derive(Clone)]
pub struct MemoryAutocommit {
    database: MemoryDatabase,
}

impl DatabaseAutocommit for MemoryAutocommit {}

macro_rules! autocommit {
    ($self:ident, $operation:ident($($arg:expr),*)) => {{
        let mut tx = $self.database.begin();
        let result = tx.$operation($($arg),*).await?;
        tx.commit().await?;
        Ok(result)
    }};
}

#[async_trait]
impl RunRepo for MemoryAutocommit {
    async fn create_run(
        &mut self,
        user_id: Id<User>,
        start_point: GeoPoint,
    ) -> Result<WithId<Run>> {
        autocommit!(self, create_run(user_id, start_point))
    }

    async fn get_run(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        autocommit!(self, get_run(id))
    }

    async fn run_for_update(&mut self, id: Id<Run>) -> Result<Option<WithId<Run>>> {
        autocommit!(self, run_for_update(id))
    }

    async fn finish_run(
        &mut self,
        id: Id<Run>,
        finish_point: GeoPoint,
        distance: i32,
    ) -> Result<Option<WithId<Run>>> {
        let mut tx = self.database.begin();
        tx.lock_run(id.raw()).await?;
        let result = tx.finish_run(id, finish_point, distance).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn finished_runs_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<Vec<WithId<Run>>> {
        autocommit!(self, finished_runs_by_user(user_id, range))
    }

    async fn stats_by_user(
        &mut self,
        user_id: Id<User>,
        range: StartRange,
    ) -> Result<RunStats> {
        autocommit!(self, stats_by_user(user_id, range))
    }
}

#[async_trait]
impl UserRepo for MemoryAutocommit {
    async fn get_user(&mut self, id: Id<User>) -> Result<Option<WithId<User>>> {
        autocommit!(self, get_user(id))
    }

    async fn get_users(&mut self) -> Result<Vec<WithId<User>>> {
        autocommit!(self, get_users())
    }

    async fn create_user(&mut self, user: User) -> Result<WithId<User>> {
        autocommit!(self, create_user(user))
    }

    async fn update_user(&mut self, user: WithId<User>) -> Result<Option<WithId<User>>> {
        autocommit!(self, update_user(user))
    }

    async fn delete_user(&mut self, id: Id<User>) -> Result<bool> {
        autocommit!(self, delete_user(id))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Transaction = MemoryTransaction;
    type Autocommit = MemoryAutocommit;

    async fn transaction(&self) -> Result<Self::Transaction> {
        Ok(self.begin())
    }

    fn auto(&self) -> Self::Autocommit {
        MemoryAutocommit {
            database: self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use model::user::Sex;

    use super::*;

    fn user() -> User {
        User::new(
            "Barbara",
            "Moore",
            NaiveDate::from_ymd_opt(1994, 12, 23).unwrap(),
            Sex::Female,
        )
        .unwrap()
    }

    fn start_point() -> GeoPoint {
        let datetime = NaiveDate::from_ymd_opt(2023, 11, 8)
            .unwrap()
            .and_hms_opt(11, 23, 34)
            .unwrap();
        GeoPoint::from_degrees(datetime, 41.644035, 41.633785).unwrap()
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let database = MemoryDatabase::new();
        let user = database.auto().create_user(user()).await.unwrap();

        let mut tx = database.transaction().await.unwrap();
        let run = tx.create_run(user.id, start_point()).await.unwrap();
        assert!(tx.get_run(run.id).await.unwrap().is_some());
        assert!(database.auto().get_run(run.id).await.unwrap().is_none());
        drop(tx);

        assert!(database.auto().get_run(run.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn locks_are_released_on_drop() {
        let database = MemoryDatabase::with_lock_timeout(Duration::from_millis(50));
        let user = database.auto().create_user(user()).await.unwrap();
        let run = database.auto().create_run(user.id, start_point()).await.unwrap();

        let mut first = database.transaction().await.unwrap();
        assert!(first.run_for_update(run.id).await.unwrap().is_some());

        let mut second = database.transaction().await.unwrap();
        assert!(matches!(
            second.run_for_update(run.id).await,
            Err(DatabaseError::LockTimeout)
        ));

        drop(first);
        assert!(second.run_for_update(run.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lock_table_is_empty_once_transactions_end() {
        let database = MemoryDatabase::new();
        let user = database.auto().create_user(user()).await.unwrap();
        let run = database.auto().create_run(user.id, start_point()).await.unwrap();

        for id in 1_000..2_000 {
            let mut tx = database.transaction().await.unwrap();
            assert!(tx.run_for_update(Id::new(id)).await.unwrap().is_none());
            assert_eq!(database.run_lock_count(), 0);
        }
        let mut tx = database.transaction().await.unwrap();
        for id in 1_000..2_000 {
            assert!(tx.run_for_update(Id::new(id)).await.unwrap().is_none());
        }
        assert_eq!(database.run_lock_count(), 0);
        drop(tx);

        let mut tx = database.transaction().await.unwrap();
        assert!(tx.run_for_update(run.id).await.unwrap().is_some());
        assert_eq!(database.run_lock_count(), 1);
        tx.commit().await.unwrap();
        assert_eq!(database.run_lock_count(), 0);

        let mut tx = database.transaction().await.unwrap();
        assert!(tx.run_for_update(run.id).await.unwrap().is_some());
        drop(tx);
        assert_eq!(database.run_lock_count(), 0);

        assert!(database.auto().get_run(run.id).await.unwrap().is_some());
        assert_eq!(database.run_lock_count(), 0);
    }

    #[tokio::test]
    async fn timed_out_waiters_do_not_leak_locks() {
        let database = MemoryDatabase::with_lock_timeout(Duration::from_millis(20));
        let user = database.auto().create_user(user()).await.unwrap();
        let run = database.auto().create_run(user.id, start_point()).await.unwrap();

        let mut holder = database.transaction().await.unwrap();
        assert!(holder.run_for_update(run.id).await.unwrap().is_some());

        let mut waiter = database.transaction().await.unwrap();
        assert!(waiter.run_for_update(run.id).await.is_err());
        drop(waiter);
        assert_eq!(database.run_lock_count(), 1);

        drop(holder);
        assert_eq!(database.run_lock_count(), 0);
    }

    #[tokio::test]
    async fn deleting_a_user_deletes_their_runs() {
        let database = MemoryDatabase::new();
        let user = database.auto().create_user(user()).await.unwrap();
        let run = database.auto().create_run(user.id, start_point()).await.unwrap();

        assert!(database.auto().delete_user(user.id).await.unwrap());
        assert!(database.auto().get_run(run.id).await.unwrap().is_none());
        assert!(!database.auto().delete_user(user.id).await.unwrap());
    }
}
