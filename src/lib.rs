pub mod aggregate;
pub mod articles;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod flatten;
pub mod loader;
pub mod logger;
pub mod normalize;
pub mod notice;
pub mod pipeline;
pub mod resolver;
pub mod row;

pub use aggregate::Summary;
pub use error::{PipelineError, ResolutionError};
pub use notice::NoticeDocument;
pub use pipeline::PipelineOutput;
pub use resolver::{NameResolver, ResolutionCache, RESOLUTION_SENTINEL};
pub use row::Row;
