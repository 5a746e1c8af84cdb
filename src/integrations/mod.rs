//! External service integrations.

pub mod email_client {
    pub use crate::email_client::*;
}

pub mod notify {
    pub use crate::notify::*;
}
