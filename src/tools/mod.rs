pub mod audio_metadata;
pub mod epub_metadata;
pub mod file_hasher;
pub mod file_mover;
pub mod file_scanner;
pub mod json_metadata;
pub mod metadata;
pub mod metadata_resolver;
pub mod path_sanitizer;
pub mod path_validator;
pub mod prompter;

pub use audio_metadata::AudioMetadataProvider;
pub use epub_metadata::EpubMetadataProvider;
pub use file_hasher::{hash_file, verify_file_hash};
pub use file_mover::{MoveMethod, move_file};
pub use file_scanner::{list_files, scan_directories};
pub use json_metadata::{JsonMetadataProvider, SIDECAR_FILE_NAME};
pub use metadata::{INVALID_SERIES, Metadata, SourceType};
pub use metadata_resolver::{MetadataProvider, MetadataResolver};
pub use path_sanitizer::{PathSanitizer, TargetOs};
pub use path_validator::{ensure_directory_exists, validate_directory_exists};
pub use prompter::{DialoguerPrompter, FixedPrompter, Prompter};
