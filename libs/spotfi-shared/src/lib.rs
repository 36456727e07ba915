pub mod chap;
pub mod error;
pub mod normalize;
pub mod rpc;
pub mod topics;
pub mod xtunnel;

pub use error::SharedError;
