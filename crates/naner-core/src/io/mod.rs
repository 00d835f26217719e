//! IO modules - side effects (network, filesystem, subprocesses)

pub mod extract;
pub mod transport;
pub mod verify;
