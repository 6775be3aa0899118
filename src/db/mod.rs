pub mod connection;
pub mod pool_ext;
pub mod repositories;

pub use connection::verify_connection;
pub use repositories::*;
