//! Integration tests for the API root

mod cli_contracts;
mod dispatch;
mod support;
mod teardown;
mod watchers;
