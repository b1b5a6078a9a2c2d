pub mod config;
pub mod db;
pub mod error;
pub mod navigation;
pub mod state;
pub mod storage;

pub mod identity {
    pub mod channel;
    pub mod gotrue;
    pub mod provider;
}

pub mod models {
    pub mod event;
    pub mod profile;
    pub mod session;
    pub mod user;
    pub mod vehicle;
}

pub mod repositories {
    pub mod profile;
    pub mod vehicle;
}

pub mod services {
    pub mod auth;
    pub mod profile;
    pub mod vehicles;
}

pub mod validation {
    pub mod auth;
    pub mod profile;
    pub mod vehicle;
}

pub use config::Config;
pub use error::{AppError, Result};
pub use state::{AppState, SessionSnapshot, SessionStore};
