pub mod backend;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod http;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pagination;
pub mod session;

pub use backend::Backend;
pub use engine::Engine;
pub use error::{ClientError, ClientResult};
pub use http::HttpBackend;
pub use session::Session;
