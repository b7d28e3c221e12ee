mod link_preview;

pub use link_preview::{PreviewError, PreviewResult};
