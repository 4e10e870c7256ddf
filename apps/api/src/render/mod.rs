pub mod gateway;
pub mod handlers;
pub mod request;

pub use gateway::{RenderResult, RenderingGateway};
