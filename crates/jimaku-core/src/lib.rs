pub mod config;
pub mod error;
pub mod normalize;
pub mod score;
pub mod source;
pub mod stream;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
