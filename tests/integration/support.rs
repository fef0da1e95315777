use apiroot::types::MachineJob;
use apiroot::{Entity, Root, Server, ServerConfig};
use std::future::Future;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(5);

/// Server with machine 0 (hosting `mysql/0`) and machine 1 (hosting
/// `wordpress/0`).
pub fn server() -> Server {
    let server = Server::new(ServerConfig::default()).unwrap();
    let state = server.state();
    state.add_machine(vec![MachineJob::HostUnits]).unwrap();
    state.add_machine(vec![MachineJob::HostUnits]).unwrap();
    state.add_unit("mysql", Some("0")).unwrap();
    state.add_unit("wordpress", Some("1")).unwrap();
    server
}

pub fn machine_agent(server: &Server, id: &str) -> Root {
    server
        .login(Entity::machine(id, vec![MachineJob::HostUnits]))
        .unwrap()
}

pub fn admin(server: &Server) -> Root {
    server.login(Entity::user("admin")).unwrap()
}

pub fn tags(ts: &[&str]) -> Vec<String> {
    ts.iter().map(|t| t.to_string()).collect()
}

pub async fn soon<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("operation did not complete in time")
}
