pub mod io;
pub mod model;
pub mod validation;

pub use io::{read_config, write_config};
pub use model::{FallbackPolicy, LadderConfig};
pub use validation::{ensure_valid, validate_config};
