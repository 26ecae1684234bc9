//! # multibar
//!
//! Flicker-free multi progress bar rendering for concurrent terminal
//! workloads, driven by a Tokio render loop.
//!
//! ## Architecture
//!
//! Every bar is an actor: the only way to reach its state is its inbox of
//! tagged operations (increment, refill, abort, render requests). A single
//! orchestrator task per [`Progress`] instance ticks on a refresh interval,
//! asks every visible bar for a consistent snapshot in two message rounds
//! (measure, then render with synchronized column widths), assembles one
//! frame, and writes it to the output sink so that it fully replaces the
//! previous frame. Producer calls never block and never fail.
//!
//! ```text
//! producers ──▶ bar inbox ──▶ bar actor ─┐ measure / render
//!                                        ├──▶ orchestrator ──▶ frame ──▶ sink
//! producers ──▶ bar inbox ──▶ bar actor ─┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use multibar::{decor, BarOptions, Progress, WC};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let progress = Progress::new();
//! let bar = progress.add_bar(
//!     100,
//!     BarOptions::default()
//!         .prepend(decor::Name::new("download:").with_wc(WC::default().synced()))
//!         .append(decor::Percentage::new()),
//! );
//!
//! for _ in 0..100 {
//!     // ... some unit of work ...
//!     bar.incr();
//! }
//!
//! progress.wait().await;
//! # }
//! ```

// ── Lint policy ────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;

pub mod decor;

mod bar;
mod counter;
mod filler;
mod options;
mod progress;
mod queue;
mod sync;
mod writer;

pub use bar::Bar;
pub use counter::TaskCounter;
pub use decor::{DecorError, Decorator, Statistics, WC};
pub use filler::{BarFiller, Filler};
pub use options::BarOptions;
pub use progress::{Progress, ProgressBuilder};

/// Top-level errors surfaced by the rendering engine.
///
/// Producer-facing calls (`incr_by`, `set_priority`, `abort`, …) are
/// infallible by contract; these variants only occur inside the render loop
/// and are logged rather than propagated to producers.
#[derive(Error, Debug)]
pub enum MultibarError {
    /// Writing a frame to the output sink failed.
    #[error("output sink write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The orchestrator has already shut down.
    #[error("progress session has shut down")]
    Terminated,
}
