pub mod config;
pub mod error;
pub mod graph;
pub mod node;
pub mod payload;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use graph::*;
pub use node::*;
pub use payload::*;
pub use traits::*;
pub use types::*;
