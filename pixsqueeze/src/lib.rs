pub mod archive;
pub mod dispatch;
pub mod image;
pub mod options;
pub mod registry;

// Re-export commonly used types
pub use dispatch::{BatchMode, BatchOutcome, Debouncer, Dispatcher};
pub use image::{CompressedImage, OutputFormat};
pub use options::CompressOptions;
pub use registry::{ImageRecord, Registry, MAX_FILE_SIZE};
