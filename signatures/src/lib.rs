pub mod archive;
pub mod metrics_defs;
pub mod rows;
pub mod source;
pub mod types;

pub use archive::{ArchiveConfig, ArchiveSource};
pub use rows::RowsSource;
pub use source::{GroupIter, SignatureGroups, SignatureSource, SourceError, StaticGroups};
pub use types::{MalformedInputError, SignatureGroup};
