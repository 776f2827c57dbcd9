pub mod api;
pub mod http;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod store;

pub use api::MatchmakerApi;
pub use http::HttpApi;
pub use store::PrefsStore;
