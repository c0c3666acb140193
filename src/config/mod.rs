pub mod load;
pub mod types;

pub use types::{
    DEFAULT_SERIES_PADDING, FieldMapping, FileTypeTable, Layout, OrganizerConfig, SeriesFormat,
    UserSettings,
};
