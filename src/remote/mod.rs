//! Remote host driver (§4.5): an SSH session plus a container-daemon
//! command vocabulary layered on it.

pub mod docker;

pub use docker::RemoteDocker;
