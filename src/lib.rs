pub mod conf;
pub mod constants;
pub mod utils;
pub mod wire;
