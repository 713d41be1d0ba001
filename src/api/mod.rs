//! Entry points for hosts of the alignment engine
//!
//! A session owns the projection registry, configuration and pose index of
//! one video. Alignments can run inline or on a worker thread whose result is
//! published to readers through a [`TransformCell`].

pub mod handoff;
pub mod session;
pub mod types;

pub use handoff::{spawn_alignment, PendingAlignment, TransformCell};
pub use session::AlignmentSession;
pub use types::{AlignmentReport, PoseReport};
