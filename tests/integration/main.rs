//! Integration tests for the state synchronization engine

mod locking;
mod remote_sync;
mod support;
