//! Artifact Bundle
//!
//! Document construction and all-or-nothing persistence for one run's
//! artifact set.

pub mod documents;
pub mod onboarding;
pub mod writer;

pub use documents::{Document, build_documents};
pub use writer::ArtifactWriter;
