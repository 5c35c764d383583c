pub mod constants;
pub mod protocol;
pub mod protocol_pb;
pub mod protocol_serializable;
pub mod protos;

mod manager;
mod manis_client;
mod proxies;

pub use manager::Manager;
pub use manis_client::ManisClient;
pub use proxies::{ProxyInfo, create_proxy, resolve_endpoint};
