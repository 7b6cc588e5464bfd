//! HTTP服务器模块 - 暴露推荐API供店面后端集成使用

pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod validation;

pub use models::*;
pub use server::*;
pub use state::*;
