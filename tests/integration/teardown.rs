use crate::integration::support::{admin, machine_agent, server, soon, tags};
use apiroot::state::EntityWatcher;
use apiroot::{ApiError, Lifecycle, Registered, Resource};
use futures::future::join_all;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_resolves_every_pending_fetch() {
    let server = server();
    let agent = machine_agent(&server, "0");
    let machiner = agent.machiner("").unwrap();
    let deployer = agent.deployer("").unwrap();

    let mut pending = Vec::new();
    for result in machiner.watch(&tags(&["machine-0"])).await {
        let watcher = agent.notify_watcher(&result.notify_watcher_id).unwrap();
        pending.push(tokio::spawn(async move { watcher.next().await.map(|_| 0) }));
    }
    for result in deployer.watch_units(&tags(&["machine-0"])).await {
        let watcher = agent.strings_watcher(&result.strings_watcher_id).unwrap();
        pending.push(tokio::spawn(async move { watcher.next().await.map(|c| c.len()) }));
    }
    assert_eq!(agent.resources().count(), 2);
    tokio::task::yield_now().await;

    agent.kill();
    for result in soon(join_all(pending)).await {
        assert_eq!(result.unwrap(), Err(ApiError::StoppedWatcher));
    }
    assert_eq!(agent.resources().count(), 0);
    assert_eq!(agent.lifecycle(), Lifecycle::Terminated);
}

#[tokio::test]
async fn terminated_root_refuses_everything() {
    let server = server();
    let client = admin(&server);
    let id = client.watch_all().unwrap().all_watcher_id;
    client.kill();
    client.kill();

    assert!(matches!(client.client(""), Err(ApiError::Terminated)));
    assert!(matches!(client.all_watcher(&id), Err(ApiError::Terminated)));
    assert!(matches!(client.pinger(""), Err(ApiError::Terminated)));
    assert!(matches!(client.watch_all(), Err(ApiError::Terminated)));
}

#[tokio::test]
async fn registration_after_kill_is_stopped() {
    let server = server();
    let agent = machine_agent(&server, "0");
    agent.kill();

    let late = Arc::new(EntityWatcher::for_environ(server.state()));
    assert_eq!(
        agent.resources().register(Registered::Notify(late.clone())),
        Err(ApiError::Terminated)
    );
    // the registry stopped it on the way out
    assert_eq!(
        apiroot::watcher::NotifyWatcher::next(late.as_ref()).await,
        Err(ApiError::StoppedWatcher)
    );
    late.stop().unwrap();
}

#[tokio::test]
async fn teardown_is_per_connection() {
    let server = server();
    let a = admin(&server);
    let b = admin(&server);
    let b_id = b.watch_all().unwrap().all_watcher_id;
    a.watch_all().unwrap();

    a.kill();
    let watcher = b.all_watcher(&b_id).unwrap();
    let initial = soon(watcher.next()).await.unwrap();
    assert!(!initial.is_empty());
    assert_eq!(b.lifecycle(), Lifecycle::Active);
}
