// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Core domain logic for relabel: annotation rows, filter state, the derived
//! filtered view with its bidirectional index mapping, dual-count metrics,
//! deep links, and the view session state machine. Everything here is
//! synchronous, in-memory, and free of I/O; persistence and transport live
//! in the sibling crates.

pub mod filter;
pub mod link;
pub mod metrics;
pub mod model;
pub mod session;

pub use filter::{FilterState, FilteredView};
pub use link::DeepLink;
pub use metrics::{FilterCount, ViewMetrics};
pub use model::{
    AnnotationRow, FilterGroup, INVALID_ACTION, ParsedOutput, ParsedRow, ParsedRowCache,
    ReviewStatus, format_json,
};
pub use session::{SessionCommand, SessionEvent, SessionPhase, ViewSession};
