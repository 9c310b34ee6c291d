// 库入口，供二进制与集成测试使用。
mod api;
mod core;
pub mod document;
mod services;
pub mod storage;

pub use api::build_router;
pub use api::config::LIVENESS_TEXT;
pub use api::errors::error_response;
pub use core::{config, schemas, shutdown, state};
pub use services::{errors, profiles};
