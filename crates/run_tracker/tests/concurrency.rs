mod common;

use std::time::Duration;

use common::{at, point, runner};
use model::{run::RunState, user::Sex, user::User};
use run_tracker::{
    client::Client,
    database::{Database, DatabaseTransaction, RunRepo},
    memory::MemoryDatabase,
    RequestError,
};

#[tokio::test]
async fn concurrent_finishes_succeed_exactly_once() {
    let client = common::client();
    let user = runner(&client).await;
    let started = client
        .start_run(user.id, point(at(2023, 11, 8, 11, 23, 34), "41.644035", "41.633785"))
        .await
        .unwrap();

    let first = {
        let client = client.clone();
        let finish = point(at(2023, 11, 8, 13, 0, 0), "41.626743", "41.586784");
        tokio::spawn(async move { client.finish_run(started.id, finish, Some(1000)).await })
    };
    let second = {
        let client = client.clone();
        let finish = point(at(2023, 11, 8, 14, 0, 0), "41.626743", "41.586784");
        tokio::spawn(async move { client.finish_run(started.id, finish, Some(2000)).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    let winners: Vec<_> = results
        .iter()
        .filter_map(|result| result.as_ref().ok().cloned().flatten())
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(RequestError::AlreadyFinished)))
            .count(),
        1
    );

    let stored = client.get_run(started.id).await.unwrap().unwrap();
    assert_eq!(stored.content.state(), RunState::Finished);
    assert_eq!(stored, winners[0]);
}

#[tokio::test]
async fn many_concurrent_finishes_leave_one_result() {
    let client = common::client();
    let user = runner(&client).await;
    let started = client
        .start_run(user.id, point(at(2023, 11, 8, 11, 23, 34), "41.644035", "41.633785"))
        .await
        .unwrap();

    let attempts = (1..=8).map(|distance| {
        let client = client.clone();
        let finish = point(at(2023, 11, 8, 13, 23, 34), "41.626743", "41.586784");
        async move { client.finish_run(started.id, finish, Some(distance)).await }
    });
    let results = futures::future::join_all(attempts).await;

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(RequestError::AlreadyFinished)))
        .count();
    assert_eq!((succeeded, rejected), (1, 7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finish_waits_for_the_lock_holder() {
    let client = common::client();
    let user = runner(&client).await;
    let started = client
        .start_run(user.id, point(at(2023, 11, 8, 11, 23, 34), "41.644035", "41.633785"))
        .await
        .unwrap();
    let finish = point(at(2023, 11, 8, 13, 23, 34), "41.626743", "41.586784");

    let mut holder = client.database.transaction().await.unwrap();
    holder.run_for_update(started.id).await.unwrap().unwrap();

    let waiting = {
        let client = client.clone();
        let finish = finish.clone();
        tokio::spawn(async move { client.finish_run(started.id, finish, None).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiting.is_finished());

    holder
        .finish_run(started.id, finish, 4353)
        .await
        .unwrap()
        .unwrap();
    holder.commit().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), waiting)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(RequestError::AlreadyFinished)));

    let stored = client.get_run(started.id).await.unwrap().unwrap();
    assert_eq!(stored.content.distance(), Some(4353));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn identical_finishes_on_worker_threads_succeed_once() {
    let client = common::client();
    let user = runner(&client).await;
    let started = client
        .start_run(user.id, point(at(2023, 11, 8, 11, 23, 34), "41.644035", "41.633785"))
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            let finish = point(at(2023, 11, 8, 13, 23, 34), "41.626743", "41.586784");
            tokio::spawn(async move { client.finish_run(started.id, finish, None).await })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let succeeded = results
        .iter()
        .filter(|result| matches!(result, Ok(Some(_))))
        .count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(RequestError::AlreadyFinished)))
        .count();
    assert_eq!((succeeded, rejected), (1, 7));
}

#[tokio::test]
async fn waiting_for_a_held_lock_times_out() {
    let database = MemoryDatabase::with_lock_timeout(Duration::from_millis(50));
    let client = Client::new(database.clone());
    let user = client
        .create_user(
            User::new(
                "Elaine",
                "Johnson",
                chrono::NaiveDate::from_ymd_opt(1999, 2, 12).unwrap(),
                Sex::Nonbinary,
            )
            .unwrap(),
        )
        .await
        .unwrap();
    let started = client
        .start_run(user.id, point(at(2023, 11, 8, 11, 23, 34), "41.644035", "41.633785"))
        .await
        .unwrap();

    let mut holder = database.transaction().await.unwrap();
    holder.run_for_update(started.id).await.unwrap().unwrap();

    let result = client
        .finish_run(
            started.id,
            point(at(2023, 11, 8, 13, 23, 34), "41.626743", "41.586784"),
            None,
        )
        .await;
    match result {
        Err(error @ RequestError::TransientStoreFailure(_)) => assert!(error.is_retryable()),
        other => panic!("expected a transient failure, got {:?}", other),
    }

    drop(holder);
    let finished = client
        .finish_run(
            started.id,
            point(at(2023, 11, 8, 13, 23, 34), "41.626743", "41.586784"),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(finished.content.distance(), Some(4353));
}
