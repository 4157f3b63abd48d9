pub(crate) mod api;
pub mod config;
pub mod error;
pub mod observability;
pub mod routing;
pub mod state;
pub mod store;
pub mod stream;
pub mod upstream;

mod util;
