pub mod server;

use crate::auth::AuthConfig;

/// What the CLI resolved to do.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        config: AuthConfig,
    },
}
