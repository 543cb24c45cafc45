// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paragraph organisation: group raw OCR fragments into paragraphs and put
// them (and any other page element) into reading order.

use std::collections::{BTreeMap, VecDeque};

use rescan_core::Rect;
use rescan_core::config::ParagraphConfig;
use tracing::{debug, instrument};

use crate::model::TextZone;

/// Where an element sits for reading-order purposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingKey {
    /// Vertical anchor; the mean top of a paragraph's fragments.
    pub anchor_y: f32,
    /// Typical line height, used to decide which elements share a row.
    pub line_height: f32,
    pub x: i32,
}

impl ReadingKey {
    pub fn of_rect(rect: &Rect) -> Self {
        Self {
            anchor_y: rect.y as f32,
            line_height: rect.height as f32,
            x: rect.x,
        }
    }
}

/// Order items top-to-bottom, then left-to-right within a row.
///
/// Items are sorted by anchor; an item joins the current row when its anchor
/// lies within `row_ratio` times the smaller line height of the row's first
/// item and itself. Rows keep their vertical order and are sorted by `x`.
pub fn reading_order<T>(items: Vec<(T, ReadingKey)>, row_ratio: f32) -> Vec<T> {
    let mut items = items;
    items.sort_by(|(_, a), (_, b)| {
        a.anchor_y
            .total_cmp(&b.anchor_y)
            .then(a.x.cmp(&b.x))
            .then(a.line_height.total_cmp(&b.line_height))
    });

    let mut rows: Vec<Vec<(T, ReadingKey)>> = Vec::new();
    for (item, key) in items {
        let joins = rows.last().and_then(|row| row.first()).is_some_and(|(_, first)| {
            let threshold = row_ratio * first.line_height.min(key.line_height);
            (key.anchor_y - first.anchor_y).abs() <= threshold
        });
        match rows.last_mut() {
            Some(row) if joins => row.push((item, key)),
            _ => rows.push(vec![(item, key)]),
        }
    }

    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by_key(|(_, key)| key.x);
            row.into_iter().map(|(item, _)| item)
        })
        .collect()
}

/// Groups text fragments into paragraphs.
#[derive(Debug, Clone, Default)]
pub struct ParagraphOrganizer {
    config: ParagraphConfig,
}

impl ParagraphOrganizer {
    pub fn new(config: ParagraphConfig) -> Self {
        Self { config }
    }

    /// Whether two fragments belong to the same paragraph.
    ///
    /// Fragments of clearly different heights never match. Fragments on the
    /// same line match when the gap between them is small (overlap always
    /// counts). Otherwise the lower fragment must start within one line of the
    /// upper one (between `h` and `h * wrap_gap_ratio` below its top) and the
    /// two must overlap horizontally.
    pub fn same_paragraph(&self, a: &Rect, b: &Rect) -> bool {
        let cfg = &self.config;
        let (ha, hb) = (a.height as f32, b.height as f32);
        let min_h = ha.min(hb);
        if min_h <= 0.0 || ha.max(hb) / min_h > cfg.max_height_ratio {
            return false;
        }

        let overlap_ratio = a.vertical_overlap(b) as f32 / min_h;
        let offset = (a.y - b.y).abs() as f32;
        if overlap_ratio > cfg.min_vertical_overlap || offset < cfg.same_line_offset_ratio * min_h {
            return a.horizontal_gap(b) <= cfg.max_horizontal_gap;
        }

        let (upper, lower) = if a.y <= b.y { (a, b) } else { (b, a) };
        let start = (lower.y - upper.y) as f32;
        let line = upper.height as f32;
        if start < line || start > line * cfg.wrap_gap_ratio {
            return false;
        }
        let min_w = a.width.min(b.width) as f32;
        min_w > 0.0 && a.horizontal_overlap(b) as f32 / min_w > cfg.min_horizontal_overlap
    }

    /// Connected components of the [`same_paragraph`](Self::same_paragraph)
    /// graph, found breadth-first from each unvisited index in order. Each
    /// group lists its indices ascending.
    pub fn cluster(&self, rects: &[Rect]) -> Vec<Vec<usize>> {
        let mut visited = vec![false; rects.len()];
        let mut groups = Vec::new();

        for seed in 0..rects.len() {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            let mut queue = VecDeque::from([seed]);
            let mut group = Vec::new();

            while let Some(current) = queue.pop_front() {
                group.push(current);
                for next in 0..rects.len() {
                    if !visited[next] && self.same_paragraph(&rects[current], &rects[next]) {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            group.sort_unstable();
            groups.push(group);
        }
        groups
    }

    /// Merge fragments into one zone.
    ///
    /// Fragments are bucketed into lines by `y / (mean height * line_bucket_ratio)`
    /// and ordered by line then `x`. Same-line text is joined with a space and
    /// lines with a newline. Each line's box starts at its highest fragment and
    /// is as tall as its tallest; the zone covers all line boxes.
    pub fn merge(&self, fragments: &[&TextZone]) -> Option<TextZone> {
        if fragments.is_empty() {
            return None;
        }
        let mean_height =
            fragments.iter().map(|f| f.rect.height as f32).sum::<f32>() / fragments.len() as f32;
        let bucket_size = (mean_height * self.config.line_bucket_ratio).max(1.0);

        let mut lines: BTreeMap<i32, Vec<&TextZone>> = BTreeMap::new();
        for fragment in fragments {
            let bucket = (fragment.rect.y as f32 / bucket_size).floor() as i32;
            lines.entry(bucket).or_default().push(fragment);
        }

        let mut text_lines = Vec::with_capacity(lines.len());
        let mut rect: Option<Rect> = None;
        for line in lines.values_mut() {
            line.sort_by(|a, b| {
                (a.rect.x, a.rect.y, &a.text).cmp(&(b.rect.x, b.rect.y, &b.text))
            });
            let left = line.iter().map(|f| f.rect.x).min().unwrap_or(0);
            let right = line.iter().map(|f| f.rect.right()).max().unwrap_or(left);
            let top = line.iter().map(|f| f.rect.y).min().unwrap_or(0);
            let height = line.iter().map(|f| f.rect.height).max().unwrap_or(0);
            let line_box = Rect::new(left, top, right - left, height);
            rect = Some(rect.map_or(line_box, |r| r.union(&line_box)));

            let joined = line
                .iter()
                .map(|f| f.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            text_lines.push(joined);
        }

        Some(TextZone {
            rect: rect?,
            text: text_lines.join("\n"),
            inverted: fragments.iter().any(|f| f.inverted),
        })
    }

    /// Paragraphs with their reading keys, in cluster order.
    pub fn paragraphs(&self, zones: &[TextZone]) -> Vec<(TextZone, ReadingKey)> {
        let rects: Vec<Rect> = zones.iter().map(|z| z.rect).collect();
        self.cluster(&rects)
            .into_iter()
            .filter_map(|group| {
                let members: Vec<&TextZone> = group.iter().map(|&i| &zones[i]).collect();
                let n = members.len() as f32;
                let anchor_y = members.iter().map(|m| m.rect.y as f32).sum::<f32>() / n;
                let line_height = members.iter().map(|m| m.rect.height as f32).sum::<f32>() / n;
                let merged = self.merge(&members)?;
                let key = ReadingKey {
                    anchor_y,
                    line_height,
                    x: merged.rect.x,
                };
                Some((merged, key))
            })
            .collect()
    }

    /// Merge `zones` into paragraphs and return them in reading order.
    #[instrument(skip_all, fields(fragments = zones.len()))]
    pub fn organize(&self, zones: &[TextZone]) -> Vec<TextZone> {
        let paragraphs = self.paragraphs(zones);
        debug!(paragraphs = paragraphs.len(), "Fragments grouped");
        reading_order(paragraphs, self.config.reading_row_ratio)
    }

    pub fn reading_row_ratio(&self) -> f32 {
        self.config.reading_row_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(x: i32, y: i32, w: i32, h: i32, text: &str) -> TextZone {
        TextZone::new(Rect::new(x, y, w, h), text)
    }

    fn organizer() -> ParagraphOrganizer {
        ParagraphOrganizer::default()
    }

    #[test]
    fn same_line_fragments_merge_with_a_space() {
        let out = organizer().organize(&[zone(0, 0, 40, 20, "Hello"), zone(45, 2, 40, 20, "World")]);
        assert_eq!(out, vec![zone(0, 0, 85, 20, "Hello World")]);
    }

    #[test]
    fn wrapped_lines_merge_with_a_newline() {
        let out = organizer().organize(&[
            zone(0, 22, 100, 20, "Line two"),
            zone(0, 0, 100, 20, "Line one"),
        ]);
        assert_eq!(out, vec![zone(0, 0, 100, 42, "Line one\nLine two")]);
    }

    #[test]
    fn mismatched_heights_stay_apart() {
        let org = organizer();
        assert!(!org.same_paragraph(&Rect::new(0, 0, 100, 40), &Rect::new(0, 42, 100, 20)));
        assert!(!org.same_paragraph(&Rect::new(0, 0, 100, 40), &Rect::new(105, 0, 100, 20)));
    }

    #[test]
    fn wide_gaps_and_distant_lines_stay_apart() {
        let org = organizer();
        // Same line, 60px apart.
        assert!(!org.same_paragraph(&Rect::new(0, 0, 40, 20), &Rect::new(100, 0, 40, 20)));
        // Overlapping on the same line always merges.
        assert!(org.same_paragraph(&Rect::new(0, 0, 40, 20), &Rect::new(30, 1, 40, 20)));
        // Next line starts too far down.
        assert!(!org.same_paragraph(&Rect::new(0, 0, 100, 20), &Rect::new(0, 30, 100, 20)));
        // Next line in a different column.
        assert!(!org.same_paragraph(&Rect::new(0, 0, 100, 20), &Rect::new(200, 22, 100, 20)));
    }

    #[test]
    fn predicate_is_symmetric() {
        let org = organizer();
        let rects = [
            Rect::new(0, 0, 40, 20),
            Rect::new(45, 2, 40, 20),
            Rect::new(0, 22, 100, 20),
            Rect::new(0, 0, 100, 40),
        ];
        for a in &rects {
            for b in &rects {
                assert_eq!(org.same_paragraph(a, b), org.same_paragraph(b, a), "{a:?} {b:?}");
            }
        }
    }

    #[test]
    fn chained_fragments_form_one_component() {
        let rects = [
            Rect::new(0, 0, 40, 20),
            Rect::new(500, 500, 40, 20),
            Rect::new(45, 0, 40, 20),
            Rect::new(90, 0, 40, 20),
        ];
        assert_eq!(organizer().cluster(&rects), vec![vec![0, 2, 3], vec![1]]);
    }

    fn sample_page() -> Vec<TextZone> {
        vec![
            zone(0, 0, 200, 40, "Title"),
            zone(0, 60, 90, 20, "alpha"),
            zone(95, 61, 80, 20, "beta"),
            zone(0, 82, 180, 20, "gamma"),
            zone(300, 60, 100, 20, "side"),
        ]
    }

    #[test]
    fn page_reads_title_then_row_left_to_right() {
        let texts: Vec<String> = organizer()
            .organize(&sample_page())
            .into_iter()
            .map(|z| z.text)
            .collect();
        assert_eq!(texts, vec!["Title", "alpha beta\ngamma", "side"]);
    }

    #[test]
    fn output_does_not_depend_on_input_order() {
        let org = organizer();
        let expected = org.organize(&sample_page());

        let mut reversed = sample_page();
        reversed.reverse();
        assert_eq!(org.organize(&reversed), expected);

        let mut rotated = sample_page();
        rotated.rotate_left(2);
        assert_eq!(org.organize(&rotated), expected);

        assert_eq!(org.organize(&sample_page()), expected);
    }

    #[test]
    fn slight_skew_keeps_columns_on_one_row() {
        let items = vec![
            ("right", ReadingKey { anchor_y: 0.0, line_height: 20.0, x: 300 }),
            ("left", ReadingKey { anchor_y: 4.0, line_height: 20.0, x: 0 }),
            ("below", ReadingKey { anchor_y: 40.0, line_height: 20.0, x: 0 }),
        ];
        assert_eq!(reading_order(items, 0.5), vec!["left", "right", "below"]);
    }

    #[test]
    fn inverted_flag_survives_merge() {
        let merged = organizer()
            .merge(&[&TextZone::inverted(Rect::new(0, 0, 40, 20), "SALE"), &zone(45, 0, 40, 20, "now")])
            .expect("non-empty");
        assert!(merged.inverted);
        assert_eq!(merged.text, "SALE now");
    }

    #[test]
    fn nothing_in_nothing_out() {
        assert!(organizer().organize(&[]).is_empty());
        assert!(organizer().merge(&[]).is_none());
    }
}
