mod mock_server;
pub use mock_server::{Handshake, Incoming, MockServer};

pub mod utils;
