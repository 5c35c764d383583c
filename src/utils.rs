mod client_id;
mod next_call_id;

pub use client_id::ClientId;
pub use next_call_id::{mask_call_id, next_call_id};
