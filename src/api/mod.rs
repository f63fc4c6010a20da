pub mod messages;
pub mod proxy_api;
