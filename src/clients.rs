pub mod enrichment;
pub mod transit;

pub use enrichment::*;
pub use transit::*;
