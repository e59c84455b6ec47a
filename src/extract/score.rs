//! Completeness scoring for extracted records.

use super::ParsedContactRecord;
use crate::config::ScoringConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    JobTitle,
    Company,
    Email,
    Phone,
    Mobile,
    Address,
    Website,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Name,
        Field::JobTitle,
        Field::Company,
        Field::Email,
        Field::Phone,
        Field::Mobile,
        Field::Address,
        Field::Website,
    ];

    fn weight(self, weights: &ScoringConfig) -> f32 {
        match self {
            Field::Name => weights.name,
            Field::JobTitle => weights.job_title,
            Field::Company => weights.company,
            Field::Email => weights.email,
            Field::Phone => weights.phone,
            Field::Mobile => weights.mobile,
            Field::Address => weights.address,
            Field::Website => weights.website,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    weights: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    /// Weighted share of all eight fields that are filled.
    pub fn completeness(&self, record: &ParsedContactRecord) -> f32 {
        self.score_over(record, &Field::ALL)
    }

    /// Weighted completeness over `fields` only, normalized by their weight.
    pub fn score_over(&self, record: &ParsedContactRecord, fields: &[Field]) -> f32 {
        let total: f32 = fields.iter().map(|f| f.weight(&self.weights).max(0.0)).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let present: f32 = fields
            .iter()
            .filter(|f| record.field(**f).is_some())
            .map(|f| f.weight(&self.weights).max(0.0))
            .sum();
        (present / total).clamp(0.0, 1.0)
    }

    /// `(1 - blend) * heuristic + blend * ocr`, in [0, 1].
    pub fn blend(&self, heuristic: f32, ocr_confidence: f32) -> f32 {
        let b = self.weights.ocr_blend.clamp(0.0, 1.0);
        let value = (1.0 - b) * heuristic.clamp(0.0, 1.0) + b * ocr_confidence.clamp(0.0, 1.0);
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Completeness, blended with OCR confidence when there is one.
    pub fn score(&self, record: &ParsedContactRecord, ocr_confidence: Option<f32>) -> f32 {
        let heuristic = self.completeness(record);
        match ocr_confidence {
            Some(ocr) => self.blend(heuristic, ocr),
            None => heuristic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> ParsedContactRecord {
        ParsedContactRecord {
            name: Some("Kevin Su".into()),
            job_title: Some("Manager".into()),
            company: Some("ABC Co., Ltd.".into()),
            email: Some("kevin@abc.com".into()),
            phone: Some("02-2345-6789".into()),
            mobile: Some("0912-345-678".into()),
            address: Some("台北市信義區松仁路100號".into()),
            website: Some("www.abc.com".into()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_scores_zero_full_scores_one() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(scorer.completeness(&ParsedContactRecord::default()), 0.0);
        assert!((scorer.completeness(&full_record()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weights_follow_configuration() {
        let scorer = ConfidenceScorer::default();
        let record = ParsedContactRecord {
            name: Some("Kevin Su".into()),
            email: Some("kevin@abc.com".into()),
            ..Default::default()
        };
        assert!((scorer.completeness(&record) - 0.40).abs() < 1e-5);
        // Blank strings do not count.
        let blank = ParsedContactRecord {
            name: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(scorer.completeness(&blank), 0.0);
    }

    #[test]
    fn subset_is_normalized_by_its_own_weight() {
        let scorer = ConfidenceScorer::default();
        let record = ParsedContactRecord {
            email: Some("kevin@abc.com".into()),
            ..Default::default()
        };
        let s = scorer.score_over(&record, &[Field::Email, Field::Website]);
        assert!((s - 0.75).abs() < 1e-5);
    }

    #[test]
    fn blend_stays_in_unit_range() {
        let scorer = ConfidenceScorer::default();
        assert!((scorer.blend(1.0, 0.5) - 0.85).abs() < 1e-6);
        assert!((scorer.blend(2.0, 9.0) - 1.0).abs() < 1e-6);
        assert_eq!(scorer.blend(-1.0, f32::NAN), 0.0);
        assert!((scorer.score(&full_record(), None) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_weights_score_zero() {
        let scorer = ConfidenceScorer::new(ScoringConfig {
            name: 0.0,
            company: 0.0,
            email: 0.0,
            phone: 0.0,
            mobile: 0.0,
            job_title: 0.0,
            address: 0.0,
            website: 0.0,
            ocr_blend: 0.3,
        });
        assert_eq!(scorer.completeness(&full_record()), 0.0);
    }
}
