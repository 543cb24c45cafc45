// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout grid: derive row/column tracks from element edges, place every
// element on them, and compact away unused tracks.

use std::collections::{BTreeMap, BTreeSet};

use rescan_core::Rect;
use rescan_core::config::GridConfig;
use tracing::{debug, instrument, warn};

use crate::model::{AnalyzedDocument, DocumentGrid, GridCell};

/// Builds a [`DocumentGrid`] from an analysed document and back.
#[derive(Debug, Clone, Default)]
pub struct LayoutGridAnalyzer {
    config: GridConfig,
}

impl LayoutGridAnalyzer {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    /// Every element's top/bottom edges become rows and its left/right edges
    /// columns. With `snap_tracks` on, edges within `tolerance` of each other
    /// are first merged into one track.
    ///
    /// A cell starts at the first track at or after `edge - tolerance` and
    /// ends one past the track found the same way for the far edge.
    /// Elements that cannot be placed are left out of the grid.
    #[instrument(skip_all, fields(elements = document.elements.len()))]
    pub fn analyze_layout(&self, document: &AnalyzedDocument) -> DocumentGrid {
        let mut ys = BTreeSet::new();
        let mut xs = BTreeSet::new();
        for element in &document.elements {
            let r = element.rect();
            ys.extend([r.y, r.bottom()]);
            xs.extend([r.x, r.right()]);
        }

        let (mut rows, mut columns): (Vec<i32>, Vec<i32>) =
            (ys.into_iter().collect(), xs.into_iter().collect());
        if self.config.snap_tracks {
            rows = merge_close_lines(&rows, self.config.tolerance);
            columns = merge_close_lines(&columns, self.config.tolerance);
        }

        let tol = self.config.tolerance;
        let cells: Vec<GridCell> = document
            .elements
            .iter()
            .enumerate()
            .filter_map(|(index, element)| {
                let r = element.rect();
                let Some((row_start, row_end)) = span(&rows, r.y, r.bottom(), tol) else {
                    warn!(index, rect = ?r, "Element could not be placed on the grid");
                    return None;
                };
                let Some((col_start, col_end)) = span(&columns, r.x, r.right(), tol) else {
                    warn!(index, rect = ?r, "Element could not be placed on the grid");
                    return None;
                };
                Some(GridCell {
                    row_start,
                    row_end,
                    col_start,
                    col_end,
                    element: element.clone(),
                })
            })
            .collect();

        debug!(
            rows = rows.len(),
            columns = columns.len(),
            cells = cells.len(),
            "Layout grid built"
        );
        DocumentGrid {
            rows,
            columns,
            cells,
        }
    }

    /// Drop tracks no cell spans and renumber the rest.
    ///
    /// Running this on its own output changes nothing.
    pub fn optimize_grid(&self, grid: &DocumentGrid) -> DocumentGrid {
        let placed: Vec<&GridCell> = grid
            .cells
            .iter()
            .filter(|cell| cell_in_bounds(cell, grid))
            .collect();

        let mut used_rows = BTreeSet::new();
        let mut used_cols = BTreeSet::new();
        for cell in &placed {
            used_rows.extend(cell.row_start..cell.row_end);
            used_cols.extend(cell.col_start..cell.col_end);
        }

        let compact = |used: &BTreeSet<usize>| -> BTreeMap<usize, usize> {
            used.iter().enumerate().map(|(new, &old)| (old, new)).collect()
        };
        let row_map = compact(&used_rows);
        let col_map = compact(&used_cols);

        // Spans are contiguous and every index in them is used, so they map
        // onto contiguous spans.
        let cells = placed
            .into_iter()
            .map(|cell| GridCell {
                row_start: row_map[&cell.row_start],
                row_end: row_map[&(cell.row_end - 1)] + 1,
                col_start: col_map[&cell.col_start],
                col_end: col_map[&(cell.col_end - 1)] + 1,
                element: cell.element.clone(),
            })
            .collect();

        DocumentGrid {
            rows: row_map.keys().map(|&i| grid.rows[i]).collect(),
            columns: col_map.keys().map(|&i| grid.columns[i]).collect(),
            cells,
        }
    }

    /// Turn a grid back into a document, re-deriving each rectangle from the
    /// tracks its cell spans.
    ///
    /// Cells whose span lies outside the grid are skipped. A cell whose
    /// near and far tracks coincide keeps the element's own rectangle.
    pub fn grid_to_document(
        &self,
        grid: &DocumentGrid,
        page_width: u32,
        page_height: u32,
    ) -> AnalyzedDocument {
        let elements = grid
            .cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| {
                if !cell_in_bounds(cell, grid) {
                    warn!(index, "Grid cell spans tracks outside the grid; skipping");
                    return None;
                }
                let rect = Rect::from_edges(
                    grid.columns[cell.col_start],
                    grid.rows[cell.row_start],
                    grid.columns[cell.col_end - 1],
                    grid.rows[cell.row_end - 1],
                );
                if rect.is_valid() {
                    Some(cell.element.with_rect(rect))
                } else {
                    Some(cell.element.clone())
                }
            })
            .collect();
        AnalyzedDocument::new(elements, page_width, page_height)
    }
}

/// Collapse runs of sorted coordinates no more than `threshold` apart.
///
/// Walking left to right, a coordinate within `threshold` of the current
/// track is averaged into it; otherwise it starts a new track. Results are
/// rounded and strictly increasing.
pub fn merge_close_lines(lines: &[i32], threshold: i32) -> Vec<i32> {
    let Some((&first, rest)) = lines.split_first() else {
        return Vec::new();
    };

    let mut merged: Vec<f32> = Vec::new();
    let mut current = first as f32;
    for &line in rest {
        if line as f32 - current <= threshold as f32 {
            current = (current + line as f32) / 2.0;
        } else {
            merged.push(current);
            current = line as f32;
        }
    }
    merged.push(current);

    let mut tracks: Vec<i32> = merged.into_iter().map(|t| t.round() as i32).collect();
    tracks.dedup();
    tracks
}

fn cell_in_bounds(cell: &GridCell, grid: &DocumentGrid) -> bool {
    cell.row_start < cell.row_end
        && cell.row_end <= grid.rows.len()
        && cell.col_start < cell.col_end
        && cell.col_end <= grid.columns.len()
}

/// Index of the first track at or after `edge - tolerance`.
fn locate(tracks: &[i32], edge: i32, tolerance: i32) -> Option<usize> {
    tracks.iter().position(|&t| t >= edge - tolerance)
}

/// Half-open track span `[start, end)` for an element from `near` to `far`.
fn span(tracks: &[i32], near: i32, far: i32, tolerance: i32) -> Option<(usize, usize)> {
    Some((locate(tracks, near, tolerance)?, locate(tracks, far, tolerance)? + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentElement, ImageZone, TextZone};

    fn text(x: i32, y: i32, w: i32, h: i32) -> DocumentElement {
        TextZone::new(Rect::new(x, y, w, h), format!("{x},{y}")).into()
    }

    fn doc(elements: Vec<DocumentElement>) -> AnalyzedDocument {
        AnalyzedDocument::new(elements, 600, 800)
    }

    fn cell(rows: (usize, usize), cols: (usize, usize)) -> GridCell {
        GridCell {
            row_start: rows.0,
            row_end: rows.1,
            col_start: cols.0,
            col_end: cols.1,
            element: text(0, 0, 1, 1),
        }
    }

    #[test]
    fn two_columns_share_row_tracks() {
        let analyzer = LayoutGridAnalyzer::default();
        let grid = analyzer.analyze_layout(&doc(vec![
            text(0, 0, 100, 50),
            text(200, 0, 100, 50),
            ImageZone::new(Rect::new(0, 100, 300, 200), None).into(),
        ]));

        assert_eq!(grid.rows, vec![0, 50, 100, 300]);
        assert_eq!(grid.columns, vec![0, 100, 200, 300]);
        let spans: Vec<_> = grid
            .cells
            .iter()
            .map(|c| (c.row_start, c.row_end, c.col_start, c.col_end))
            .collect();
        assert_eq!(spans, vec![(0, 2, 0, 2), (0, 2, 2, 4), (2, 4, 0, 4)]);
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn jittered_edges_snap_to_one_track() {
        let analyzer = LayoutGridAnalyzer::default();
        let grid = analyzer.analyze_layout(&doc(vec![text(100, 0, 50, 20), text(103, 40, 60, 20)]));
        assert_eq!(grid.columns, vec![102, 150, 163]);

        let back = analyzer.grid_to_document(&grid, 600, 800);
        let xs: Vec<i32> = back.elements.iter().map(|e| e.rect().x).collect();
        assert_eq!(xs, vec![102, 102]);
        assert_eq!(back.elements[0].rect().width, 48);
    }

    #[test]
    fn unsnapped_grid_round_trips_rectangles() {
        let analyzer = LayoutGridAnalyzer::new(GridConfig {
            snap_tracks: false,
            ..GridConfig::default()
        });
        let original = doc(vec![text(10, 10, 200, 30), text(10, 60, 90, 90), text(120, 60, 90, 90)]);
        let back = analyzer.grid_to_document(&analyzer.analyze_layout(&original), 600, 800);
        assert_eq!(back.elements, original.elements);
    }

    #[test]
    fn optimize_drops_unused_tracks() {
        let grid = DocumentGrid {
            rows: vec![0, 10, 20, 30, 40],
            columns: vec![0, 5, 10],
            cells: vec![cell((0, 2), (0, 1)), cell((3, 5), (2, 3))],
        };
        let optimized = LayoutGridAnalyzer::default().optimize_grid(&grid);
        assert_eq!(optimized.rows, vec![0, 10, 30, 40]);
        assert_eq!(optimized.columns, vec![0, 10]);
        assert_eq!(optimized.cells[1].row_start, 2);
        assert_eq!(optimized.cells[1].row_end, 4);
        assert_eq!(optimized.cells[1].col_start, 1);
        assert!(optimized.validate().is_ok());
    }

    #[test]
    fn optimize_is_idempotent() {
        let analyzer = LayoutGridAnalyzer::default();
        let grids = vec![
            DocumentGrid::default(),
            DocumentGrid {
                rows: vec![0, 10, 20, 30, 40],
                columns: vec![0, 5, 10, 15],
                cells: vec![cell((1, 3), (0, 2)), cell((3, 5), (3, 4))],
            },
            DocumentGrid {
                rows: vec![0, 100],
                columns: vec![0, 50, 100, 150],
                cells: vec![cell((0, 2), (1, 3))],
            },
            DocumentGrid {
                rows: vec![0, 10],
                columns: vec![0, 10],
                cells: vec![cell((1, 4), (0, 2))],
            },
            analyzer.analyze_layout(&doc(vec![
                text(0, 0, 100, 50),
                text(200, 0, 100, 50),
                text(3, 60, 297, 40),
            ])),
        ];
        for grid in grids {
            let once = analyzer.optimize_grid(&grid);
            assert_eq!(analyzer.optimize_grid(&once), once);
            assert!(once.validate().is_ok());
        }
    }

    #[test]
    fn out_of_range_cells_are_skipped_on_rebuild() {
        let grid = DocumentGrid {
            rows: vec![0, 10],
            columns: vec![0, 10],
            cells: vec![cell((0, 2), (0, 2)), cell((1, 4), (0, 2))],
        };
        let back = LayoutGridAnalyzer::default().grid_to_document(&grid, 10, 10);
        assert_eq!(back.elements.len(), 1);
        assert_eq!(back.elements[0].rect(), Rect::new(0, 0, 10, 10));
    }

    #[test]
    fn close_lines_average_left_to_right() {
        assert_eq!(merge_close_lines(&[0, 3, 4, 20, 22, 100], 5), vec![3, 21, 100]);
        assert_eq!(merge_close_lines(&[], 5), Vec::<i32>::new());
        assert_eq!(merge_close_lines(&[7], 5), vec![7]);
    }
}
