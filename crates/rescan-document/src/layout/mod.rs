// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout stages: paragraph grouping with reading order, and the layout grid.

pub mod grid;
pub mod paragraph;

pub use grid::{LayoutGridAnalyzer, merge_close_lines};
pub use paragraph::{ParagraphOrganizer, ReadingKey, reading_order};
