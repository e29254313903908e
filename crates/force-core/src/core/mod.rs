//! # Core
//!
//! Foundation layer: host/device buffers with access-mode discipline, the particle,
//! box and topology models, neighbor enumeration, interaction math and time-varying
//! scalars. Nothing here owns a compute; the [`crate::engine`] layer builds on it.

pub mod buffer;
pub mod forcefield;
pub mod models;
pub mod neighbor;
pub mod variant;
