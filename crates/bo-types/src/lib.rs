pub mod errors;
pub mod host;
pub mod params;

pub use errors::*;
pub use host::*;
pub use params::*;
