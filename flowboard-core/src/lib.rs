//! FlowBoard core: task/column model, board projection, drag reconciliation
//! and the storage abstraction shared by the backend and the board client.

pub mod board;
pub mod drag;
pub mod events;
pub mod projects;
pub mod reconcile;
pub mod storage;
pub mod types;
