pub mod config;
pub mod context;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod response;
pub mod server;
pub mod service;
pub mod session;
pub mod speech;
