pub mod chunk;
pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod io;
pub mod reduce;
pub mod runtime;
pub mod stats;
pub mod utils;
pub mod value;
pub mod worker;

pub use chunk::{Chunk, ChunkReader, EofPolicy};
pub use config::{Settings, Strategy};
pub use error::BrcError;
pub use format::{MeanMode, OutputRow};
pub use reduce::{GlobalStats, PartialTable, Reducer};
pub use runtime::{Pipeline, Summary};
pub use value::{Scaled, Stats};
pub use worker::ChunkPolicy;
