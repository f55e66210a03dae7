mod coordination;
mod error;
mod settings;
mod status;

pub use coordination::CoordinationTable;
pub use error::CellError;
pub use settings::*;
pub use status::{ConnectionState, SystemStatus};
