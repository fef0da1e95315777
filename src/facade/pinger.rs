/// Liveness facade used by the transport heartbeat.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pinger;

impl Pinger {
    /// No-op; a successful call proves the connection is serving requests.
    pub fn ping(&self) {}
}
