//! FlowBoard board client: REST client for the backend, a board session with
//! optimistic drag-and-drop, and a plain-text board renderer.
pub mod api;
pub mod render;
pub mod session;
