use model::{
    point::GeoPoint,
    run::{Run, RunStats},
    user::User,
    StartRange, WithId,
};
use utility::{id::Id, let_also::LetAlso};

use crate::{
    database::{Database, DatabaseTransaction, RunRepo, UserRepo},
    RequestError, RequestResult,
};

/// Entry point for everything that happens to runs and users. Cloning is
/// cheap; clones share the database.
#[derive(Debug, Clone)]
pub struct Client<D>
where
    D: Database,
{
    pub database: D,
}

impl<D> Client<D>
where
    D: Database,
{
    pub fn new(database: D) -> Self {
        Self { database }
    }
}

impl<D> Client<D>
where
    D: Database,
{
    /// Starts a new run of the user at `point`.
    pub async fn start_run(
        &self,
        user_id: Id<User>,
        point: GeoPoint,
    ) -> RequestResult<WithId<Run>> {
        let mut tx = self.database.transaction().await?;
        if tx.get_user(user_id).await?.is_none() {
            log::warn!("can not start a run for unknown user {}", user_id);
            return Err(RequestError::UnknownUser(user_id.raw()));
        }
        let run = tx.create_run(user_id, point).await?;
        tx.commit().await?;
        log::info!("user {} started run {}", user_id, run.id);
        Ok(run)
    }

    /// Finishes the run at `point`. If `distance` is not given, the straight
    /// line distance between start and finish is stored.
    ///
    /// The run stays locked from the lookup until the update is committed, so
    /// of two concurrent calls for the same run the second one waits and then
    /// fails with [`RequestError::AlreadyFinished`]. Returns `None` if there is
    /// no run with this id.
    pub async fn finish_run(
        &self,
        id: Id<Run>,
        point: GeoPoint,
        distance: Option<i32>,
    ) -> RequestResult<Option<WithId<Run>>> {
        let mut tx = self.database.transaction().await?;
        let Some(current) = tx.run_for_update(id).await? else {
            log::debug!("no run {} to finish", id);
            return Ok(None);
        };

        let finished = current.content.finish(point, distance).map_err(|why| {
            log::warn!("rejected finishing run {}: {}", id, why);
            RequestError::from(why)
        })?;
        let (finish_point, distance) = finished
            .finish_point()
            .cloned()
            .zip(finished.distance())
            .ok_or_else(|| {
                RequestError::InvalidInput(format!("run {} could not be finished", id))
            })?;

        let Some(updated) = tx.finish_run(id, finish_point, distance).await? else {
            return Ok(None);
        };
        tx.commit().await?;
        log::info!(
            "run {} of user {} finished after {} m",
            id,
            updated.content.user_id(),
            distance
        );
        Ok(Some(updated))
    }

    /// Finished runs of the user started within `range`, oldest first.
    pub async fn get_runs_by_user(
        &self,
        user_id: Id<User>,
        range: StartRange,
    ) -> RequestResult<Vec<WithId<Run>>> {
        Ok(self
            .database
            .auto()
            .finished_runs_by_user(user_id, range)
            .await?)
    }

    /// Count, total distance and mean average speed of the user's finished
    /// runs started within `range`.
    pub async fn get_stats_by_user(
        &self,
        user_id: Id<User>,
        range: StartRange,
    ) -> RequestResult<RunStats> {
        Ok(self.database.auto().stats_by_user(user_id, range).await?)
    }

    pub async fn get_run(&self, id: Id<Run>) -> RequestResult<Option<WithId<Run>>> {
        Ok(self.database.auto().get_run(id).await?)
    }
}

impl<D> Client<D>
where
    D: Database,
{
    pub async fn get_user(&self, id: Id<User>) -> RequestResult<Option<WithId<User>>> {
        Ok(self.database.auto().get_user(id).await?)
    }

    pub async fn get_users(&self) -> RequestResult<Vec<WithId<User>>> {
        Ok(self.database.auto().get_users().await?)
    }

    pub async fn create_user(&self, user: User) -> RequestResult<WithId<User>> {
        self.database
            .auto()
            .create_user(user)
            .await?
            .also(|user| log::info!("created user {}", user.id))
            .let_owned(Ok)
    }

    pub async fn update_user(
        &self,
        id: Id<User>,
        user: User,
    ) -> RequestResult<Option<WithId<User>>> {
        Ok(self
            .database
            .auto()
            .update_user(WithId::new(id, user))
            .await?)
    }

    /// Deletes the user and all of their runs. `false` if there was no such
    /// user.
    pub async fn delete_user(&self, id: Id<User>) -> RequestResult<bool> {
        let deleted = self.database.auto().delete_user(id).await?;
        if deleted {
            log::info!("deleted user {}", id);
        }
        Ok(deleted)
    }
}
