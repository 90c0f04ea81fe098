//! Image correction pipeline components.
//!
//! - **codec**: TIFF/JPEG decode and encode, format by extension
//! - **params**: Transform parameters loaded from a profile file
//! - **transform**: The color-correction step
//! - **discovery**: Find image files in a directory
//! - **processor**: Orchestrates decode → transform → encode per file

pub mod codec;
pub mod discovery;
pub mod params;
pub mod processor;
pub mod transform;

// Re-exports for convenient access
pub use codec::{is_supported, ImageCodec, RasterFormat, SUPPORTED_EXTENSIONS};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use params::{ProfileHeader, TransformParameters};
pub use processor::{output_path_for, ProcessingPipeline};
pub use transform::{SaturationContrast, Transform};
