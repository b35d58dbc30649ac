//! Reference speaker audio.
//!
//! Handles clips uploaded or recorded in the browser, the bundled example
//! clips, and the example table shown on the upload tab.

mod examples;
mod store;
mod transcode;

pub use examples::{DEFAULT_PROMPT, DEFAULT_SPEAKER, Example, examples};
pub use store::{MIN_REFERENCE_SECS, ReferenceClip, ReferenceError, ReferenceStore};
pub use transcode::{transcode_args, transcode_to_wav};
