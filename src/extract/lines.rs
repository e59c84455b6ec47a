//! Candidate lines of a card and which of them are already spoken for.

use crate::ocr::RecognizedTextBlock;
use std::collections::HashSet;

/// Blocks whose vertical centre lies above this fraction of the card height
/// form the upper region, where names and companies usually sit.
pub const UPPER_REGION: f32 = 0.45;

/// Without layout, this many leading lines count as the upper region.
const MIN_UPPER_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct CardLine {
    pub text: String,
    pub upper: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CardLines {
    lines: Vec<CardLine>,
}

impl CardLines {
    /// Lines from plain text; the first half (at least three lines) is the
    /// upper region.
    pub fn from_text(text: &str) -> Self {
        let texts: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let upper_count = texts.len().div_ceil(2).max(MIN_UPPER_LINES);
        Self {
            lines: texts
                .into_iter()
                .enumerate()
                .map(|(i, t)| CardLine {
                    text: t.to_string(),
                    upper: i < upper_count,
                })
                .collect(),
        }
    }

    /// Lines from positioned blocks, top to bottom.
    pub fn from_blocks(blocks: &[RecognizedTextBlock]) -> Self {
        let mut ordered: Vec<&RecognizedTextBlock> = blocks.iter().collect();
        ordered.sort_by(|a, b| {
            a.bounding_box
                .y
                .total_cmp(&b.bounding_box.y)
                .then(a.bounding_box.x.total_cmp(&b.bounding_box.x))
        });
        let lines = ordered
            .into_iter()
            .flat_map(|block| {
                let upper = block.bounding_box.center_y() < UPPER_REGION;
                block
                    .text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(move |t| CardLine {
                        text: t.to_string(),
                        upper,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&CardLine> {
        self.lines.get(idx)
    }

    /// Unclaimed lines in reading order.
    pub fn free<'a>(&'a self, claims: &'a Claims) -> impl Iterator<Item = (usize, &'a CardLine)> + 'a {
        self.lines
            .iter()
            .enumerate()
            .filter(move |(i, _)| !claims.is_claimed(*i))
    }

    /// Unclaimed lines of the upper region.
    pub fn free_upper<'a>(
        &'a self,
        claims: &'a Claims,
    ) -> impl Iterator<Item = (usize, &'a CardLine)> + 'a {
        self.free(claims).filter(|(_, line)| line.upper)
    }
}

/// Lines already attributed to a field.
#[derive(Debug, Clone, Default)]
pub struct Claims {
    taken: HashSet<usize>,
}

impl Claims {
    pub fn claim(&mut self, idx: usize) {
        self.taken.insert(idx);
    }

    pub fn is_claimed(&self, idx: usize) -> bool {
        self.taken.contains(&idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;

    #[test]
    fn text_lines_split_into_regions() {
        let lines = CardLines::from_text("a\nb\n\nc\nd\ne\nf\ng\nh");
        assert_eq!(lines.len(), 8);
        let upper: Vec<bool> = (0..8).map(|i| lines.get(i).unwrap().upper).collect();
        assert_eq!(upper, vec![true, true, true, true, false, false, false, false]);
    }

    #[test]
    fn short_text_is_all_upper() {
        let lines = CardLines::from_text("a\nb");
        assert!(lines.get(1).unwrap().upper);
    }

    #[test]
    fn block_region_follows_layout() {
        let blocks = vec![
            RecognizedTextBlock::new("bottom", 0.9, BoundingBox::new(0.1, 0.8, 0.5, 0.05)),
            RecognizedTextBlock::new("top", 0.9, BoundingBox::new(0.1, 0.1, 0.5, 0.05)),
        ];
        let lines = CardLines::from_blocks(&blocks);
        assert_eq!(lines.get(0).unwrap().text, "top");
        assert!(lines.get(0).unwrap().upper);
        assert!(!lines.get(1).unwrap().upper);
    }

    #[test]
    fn claimed_lines_are_skipped() {
        let lines = CardLines::from_text("a\nb\nc");
        let mut claims = Claims::default();
        claims.claim(1);
        let free: Vec<usize> = lines.free(&claims).map(|(i, _)| i).collect();
        assert_eq!(free, vec![0, 2]);
    }
}
