//! The shared resume document: schema, agent-output repair, merge contract
//! and the in-memory store both the agent and the UI write through.

pub mod handlers;
pub mod merge;
pub mod models;
pub mod repair;
pub mod store;

pub use store::ResumeStore;
