use serde::{Deserialize, Serialize};

/// Per-subject pass threshold, in percent of that subject's max marks.
pub const PASS_THRESHOLD_PERCENT: f64 = 33.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A+" => Some(Grade::APlus),
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            "E" => Some(Grade::E),
            _ => None,
        }
    }

    pub fn is_fail_band(self) -> bool {
        self == Grade::E
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PassStatus {
    Pass,
    Fail,
}

impl PassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PassStatus::Pass => "PASS",
            PassStatus::Fail => "FAIL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PASS" => Some(PassStatus::Pass),
            "FAIL" => Some(PassStatus::Fail),
            _ => None,
        }
    }
}

/// Slack for band comparisons; decimal marks such as 33.3 are not exact in
/// binary and their sums can land a few ulps under a boundary.
pub const BAND_EPSILON: f64 = 1e-9;

// Inclusive lower bounds, highest first.
const GRADE_BANDS: [(f64, Grade); 5] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::B),
    (50.0, Grade::C),
    (33.0, Grade::D),
];

pub fn grade_for_percentage(percentage: f64) -> Grade {
    GRADE_BANDS
        .iter()
        .find(|(lower, _)| percentage + BAND_EPSILON >= *lower)
        .map(|(_, g)| *g)
        .unwrap_or(Grade::E)
}

/// VB6-compatible 1-decimal rounding: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn format_percent(x: f64) -> String {
    format!("{:.1}", round_off_1_decimal(x))
}

/// Marks are printed without trailing zeros: `95`, `42.5`, `12.25`.
pub fn format_marks(x: f64) -> String {
    if (x - x.round()).abs() < 1e-9 {
        return format!("{:.0}", x.round());
    }
    let s = format!("{:.2}", x);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn subject_percentage(obtained: f64, max_marks: f64) -> f64 {
    if max_marks > 0.0 {
        100.0 * obtained / max_marks
    } else {
        0.0
    }
}

/// Grade for one subject line. An unentered subject counts as zero.
pub fn subject_grade(obtained: Option<f64>, max_marks: f64) -> Grade {
    grade_for_percentage(subject_percentage(obtained.unwrap_or(0.0), max_marks))
}

/// One exam subject as seen by the scorer: its max marks and the marks
/// obtained, if any have been entered yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubjectLine {
    pub max_marks: f64,
    pub obtained: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub total_obtained: f64,
    pub total_max: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub status: PassStatus,
}

/// Derives totals, percentage, grade and status from the exam's subject
/// lines, in exam order.
///
/// A result fails when its aggregate falls in the E band or when any single
/// subject is below [`PASS_THRESHOLD_PERCENT`] of that subject's max marks.
pub fn score_result<I>(lines: I) -> ScoreSummary
where
    I: IntoIterator<Item = SubjectLine>,
{
    let mut total_obtained = 0.0;
    let mut total_max = 0.0;
    let mut subject_failed = false;

    for line in lines {
        let obtained = line.obtained.unwrap_or(0.0);
        total_obtained += obtained;
        total_max += line.max_marks;
        if subject_percentage(obtained, line.max_marks) + BAND_EPSILON < PASS_THRESHOLD_PERCENT {
            subject_failed = true;
        }
    }

    let percentage = if total_max > 0.0 {
        100.0 * total_obtained / total_max
    } else {
        0.0
    };
    let grade = grade_for_percentage(percentage);
    let status = if grade.is_fail_band() || subject_failed {
        PassStatus::Fail
    } else {
        PassStatus::Pass
    };

    ScoreSummary {
        total_obtained,
        total_max,
        percentage,
        grade,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(pairs: &[(f64, Option<f64>)]) -> Vec<SubjectLine> {
        pairs
            .iter()
            .map(|(max_marks, obtained)| SubjectLine {
                max_marks: *max_marks,
                obtained: *obtained,
            })
            .collect()
    }

    #[test]
    fn decimal_marks_on_a_boundary_reach_the_band() {
        let s = score_result(lines(&[
            (100.0, Some(33.3)),
            (100.0, Some(95.1)),
            (100.0, Some(81.6)),
        ]));
        assert!((s.percentage - 70.0).abs() < 1e-9);
        assert_eq!(s.grade, Grade::B);
        assert_eq!(format_percent(s.percentage), "70.0");
        assert_eq!(s.status, PassStatus::Pass);

        assert_eq!(grade_for_percentage(69.999_999_999_999_99), Grade::B);
        assert_eq!(grade_for_percentage(69.99), Grade::C);
        assert_eq!(subject_grade(Some(32.999_999_999_999_99), 100.0), Grade::D);
    }

    #[test]
    fn round_off_matches_vb6() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(35.6818), 35.7);
        assert_eq!(format_percent(66.666_666), "66.7");
        assert_eq!(format_percent(90.0), "90.0");
    }

    #[test]
    fn grade_bands_use_inclusive_lower_bounds() {
        assert_eq!(grade_for_percentage(100.0), Grade::APlus);
        assert_eq!(grade_for_percentage(90.0), Grade::APlus);
        assert_eq!(grade_for_percentage(89.999), Grade::A);
        assert_eq!(grade_for_percentage(80.0), Grade::A);
        assert_eq!(grade_for_percentage(70.0), Grade::B);
        assert_eq!(grade_for_percentage(69.9), Grade::C);
        assert_eq!(grade_for_percentage(50.0), Grade::C);
        assert_eq!(grade_for_percentage(33.0), Grade::D);
        assert_eq!(grade_for_percentage(32.99), Grade::E);
        assert_eq!(grade_for_percentage(0.0), Grade::E);
    }

    #[test]
    fn strong_result_passes_with_a_plus() {
        let s = score_result(lines(&[(100.0, Some(95.0)), (100.0, Some(85.0))]));
        assert_eq!(s.total_obtained, 180.0);
        assert_eq!(s.total_max, 200.0);
        assert_eq!(s.percentage, 90.0);
        assert_eq!(s.grade, Grade::APlus);
        assert_eq!(s.status, PassStatus::Pass);
    }

    #[test]
    fn one_weak_subject_fails_an_otherwise_passing_aggregate() {
        let s = score_result(lines(&[(100.0, Some(20.0)), (100.0, Some(85.0))]));
        assert_eq!(s.percentage, 52.5);
        assert_eq!(s.grade, Grade::C);
        assert_eq!(s.status, PassStatus::Fail);
    }

    #[test]
    fn subject_threshold_is_relative_to_that_subjects_max() {
        // 17/50 = 34% passes even though 17 < 33 marks.
        let s = score_result(lines(&[(50.0, Some(17.0)), (100.0, Some(60.0))]));
        assert_eq!(s.status, PassStatus::Pass);
        let s = score_result(lines(&[(50.0, Some(16.0)), (100.0, Some(60.0))]));
        assert_eq!(s.status, PassStatus::Fail);
    }

    #[test]
    fn unentered_subject_counts_as_zero_but_keeps_total_max() {
        let s = score_result(lines(&[(100.0, Some(90.0)), (50.0, None)]));
        assert_eq!(s.total_obtained, 90.0);
        assert_eq!(s.total_max, 150.0);
        assert_eq!(s.status, PassStatus::Fail);
    }

    #[test]
    fn rescoring_identical_inputs_is_deterministic() {
        let input = lines(&[(80.0, Some(61.5)), (20.0, Some(13.0)), (100.0, Some(72.25))]);
        let a = score_result(input.clone());
        let b = score_result(input);
        assert_eq!(a, b);
        assert!(a.percentage >= 0.0 && a.percentage <= 100.0);
        assert_eq!(a.grade, grade_for_percentage(a.percentage));
    }

    #[test]
    fn per_subject_grade_uses_subject_percentage() {
        assert_eq!(subject_grade(Some(45.0), 50.0), Grade::APlus);
        assert_eq!(subject_grade(Some(20.0), 100.0), Grade::E);
        assert_eq!(subject_grade(None, 100.0), Grade::E);
    }

    #[test]
    fn marks_format_without_trailing_zeros() {
        assert_eq!(format_marks(95.0), "95");
        assert_eq!(format_marks(42.5), "42.5");
        assert_eq!(format_marks(12.25), "12.25");
    }

    #[test]
    fn grade_and_status_round_trip_through_strings() {
        for g in [Grade::APlus, Grade::A, Grade::B, Grade::C, Grade::D, Grade::E] {
            assert_eq!(Grade::parse(g.as_str()), Some(g));
        }
        assert_eq!(PassStatus::parse("FAIL"), Some(PassStatus::Fail));
        assert_eq!(
            serde_json::to_value(Grade::APlus).expect("serialize grade"),
            serde_json::json!("A+")
        );
    }
}
