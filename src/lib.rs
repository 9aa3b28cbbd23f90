pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod observability;
pub mod overrides;
pub mod routing;
pub mod signer;
pub mod stream;
pub mod upstream;
