//! Audio output: the playback collaborator and the speech pipeline
//!
//! Synthesis and playback overlap through a bounded queue; device-level
//! audio I/O stays behind the [`Playback`] trait.

mod playback;
mod speech;

pub use playback::{CpalPlayback, NullPlayback, Playback};
pub use speech::{QUEUE_CAPACITY, SpeechPipeline};
