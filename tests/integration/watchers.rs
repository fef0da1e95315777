use crate::integration::support::{admin, machine_agent, server, soon, tags};
use apiroot::facade::params::SetStatus;
use apiroot::state::EntityWatcher;
use apiroot::types::{Life, StatusKind};
use apiroot::{ApiError, Registered};
use std::sync::Arc;

#[test]
fn category_mismatch_reports_unknown_resource() {
    let server = server();
    let agent = machine_agent(&server, "0");
    let watcher = Arc::new(EntityWatcher::for_environ(server.state()));
    let id = agent
        .resources()
        .register(Registered::Notify(watcher))
        .unwrap();

    assert!(matches!(agent.all_watcher(&id), Err(ApiError::UnknownResource)));
    assert!(matches!(agent.strings_watcher(&id), Err(ApiError::UnknownResource)));
    let wrapper = agent.notify_watcher(&id).unwrap();
    assert_eq!(wrapper.id(), id);
}

#[test]
fn watcher_ids_are_private_to_a_connection() {
    let server = server();
    let a = admin(&server);
    let b = admin(&server);
    let id = a.watch_all().unwrap().all_watcher_id;
    assert!(a.all_watcher(&id).is_ok());
    assert!(matches!(b.all_watcher(&id), Err(ApiError::UnknownResource)));
}

#[tokio::test]
async fn machiner_watch_then_next_through_wrapper() {
    let server = server();
    let agent = machine_agent(&server, "0");
    let machiner = agent.machiner("").unwrap();
    let result = machiner.watch(&tags(&["machine-0"])).await.remove(0);
    assert!(result.error.is_none());
    let watcher = agent.notify_watcher(&result.notify_watcher_id).unwrap();

    let waiting = tokio::spawn(async move { watcher.next().await });
    machiner.set_status(&[SetStatus {
        tag: "machine-0".into(),
        status: StatusKind::Started,
        info: String::new(),
    }]);
    assert_eq!(soon(waiting).await.unwrap(), Ok(()));
}

#[tokio::test]
async fn deployer_units_watcher_reports_changes() {
    let server = server();
    let agent = machine_agent(&server, "0");
    let deployer = agent.deployer("").unwrap();
    let result = deployer.watch_units(&tags(&["machine-0"])).await.remove(0);
    assert_eq!(result.changes, vec!["mysql/0".to_string()]);
    let watcher = agent.strings_watcher(&result.strings_watcher_id).unwrap();

    server.state().advance_unit_life("mysql/0", Life::Dying).unwrap();
    assert_eq!(soon(watcher.next()).await.unwrap(), vec!["mysql/0".to_string()]);

    watcher.stop().unwrap();
    assert!(matches!(
        agent.strings_watcher(&result.strings_watcher_id),
        Err(ApiError::UnknownResource)
    ));
}

#[tokio::test]
async fn all_watcher_streams_deltas_to_client() {
    let server = server();
    let client = admin(&server);
    let id = client.watch_all().unwrap().all_watcher_id;
    let watcher = client.all_watcher(&id).unwrap();

    let initial = soon(watcher.next()).await.unwrap();
    assert_eq!(initial.len(), 4);

    client.client("").unwrap().destroy_machine("1").unwrap();
    let deltas = soon(watcher.next()).await.unwrap();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].entity.key(), ("machine", "1"));
}

#[tokio::test]
async fn store_close_ends_pending_fetch() {
    let server = server();
    let client = admin(&server);
    let id = client.watch_all().unwrap().all_watcher_id;
    let watcher = client.all_watcher(&id).unwrap();
    soon(watcher.next()).await.unwrap();

    let waiting = tokio::spawn(async move { watcher.next().await });
    tokio::task::yield_now().await;
    server.close();
    let result = soon(waiting).await.unwrap();
    assert_eq!(result.unwrap_err(), ApiError::StoreClosed);
}
