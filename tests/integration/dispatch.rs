use crate::integration::support::{admin, machine_agent, server, tags};
use apiroot::types::MachineJob;
use apiroot::{ApiError, Entity, Lifecycle};

#[test]
fn non_empty_id_is_rejected_without_side_effects() {
    let server = server();
    let agent = machine_agent(&server, "0");
    for id in ["x", " ", "0", "machiner"] {
        assert!(matches!(agent.machiner(id), Err(ApiError::BadIdentifier)));
        assert!(matches!(agent.deployer(id), Err(ApiError::BadIdentifier)));
        assert!(matches!(agent.upgrader(id), Err(ApiError::BadIdentifier)));
        assert!(matches!(agent.machine_agent(id), Err(ApiError::BadIdentifier)));
    }
    assert_eq!(agent.resources().count(), 0);
}

#[test]
fn client_cannot_reach_agent_facades() {
    let server = server();
    let client = admin(&server);
    assert!(matches!(client.machiner(""), Err(ApiError::PermissionDenied)));
    assert!(matches!(client.deployer(""), Err(ApiError::PermissionDenied)));
    assert!(matches!(client.upgrader(""), Err(ApiError::PermissionDenied)));
    assert!(client.client("").is_ok());
    assert!(client.status().is_ok());
}

#[test]
fn agent_cannot_reach_client_facade() {
    let server = server();
    let agent = machine_agent(&server, "0");
    assert!(matches!(agent.client(""), Err(ApiError::PermissionDenied)));
    assert!(matches!(agent.status(), Err(ApiError::PermissionDenied)));
    assert!(matches!(agent.watch_all(), Err(ApiError::PermissionDenied)));
    assert_eq!(agent.resources().count(), 0);
}

#[test]
fn pinger_needs_empty_id_but_no_role() {
    let server = server();
    for root in [admin(&server), machine_agent(&server, "0")] {
        assert_eq!(root.lifecycle(), Lifecycle::Created);
        assert!(matches!(root.pinger("nonempty"), Err(ApiError::BadIdentifier)));
        assert_eq!(root.lifecycle(), Lifecycle::Active);
        root.pinger("").unwrap().ping();
    }
}

#[test]
fn facades_apply_ownership_per_entity() {
    let server = server();
    let agent = machine_agent(&server, "0");
    let machiner = agent.machiner("").unwrap();
    let results = machiner.life(&tags(&["machine-0", "machine-1"]));
    assert!(results[0].error.is_none());
    assert_eq!(
        results[1].error.as_ref().map(|e| e.code.as_str()),
        Some("unauthorized access")
    );

    let deployer = agent.deployer("").unwrap();
    let results = deployer.life(&tags(&["unit-mysql-0", "unit-wordpress-0"]));
    assert!(results[0].error.is_none());
    assert!(results[1].error.is_some());
}

#[test]
fn unit_agent_gets_only_the_upgrader() {
    let server = server();
    let unit = server.login(Entity::unit("mysql/0")).unwrap();
    assert!(matches!(unit.machiner(""), Err(ApiError::PermissionDenied)));
    assert!(matches!(unit.deployer(""), Err(ApiError::PermissionDenied)));
    let upgrader = unit.upgrader("").unwrap();
    let tools = upgrader.tools(&tags(&["unit-mysql-0"]));
    assert_eq!(tools[0].version.as_deref(), Some("1.0.0"));
}

#[test]
fn client_changes_are_visible_to_agents() {
    let server = server();
    let client = admin(&server).client("").unwrap();
    let id = client
        .add_machine(vec![MachineJob::HostUnits, MachineJob::ManageEnviron])
        .unwrap();
    let agent = server
        .login(Entity::machine(
            id.clone(),
            vec![MachineJob::HostUnits, MachineJob::ManageEnviron],
        ))
        .unwrap();
    let machines = agent
        .machine_agent("")
        .unwrap()
        .get_machines(&[format!("machine-{}", id)]);
    assert_eq!(machines[0].jobs.len(), 2);
}
