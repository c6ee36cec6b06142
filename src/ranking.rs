use std::cmp::Ordering;

/// Totals closer than this are treated as a tie.
const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub result_id: String,
    pub student_id: String,
    pub total_obtained: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub result_id: String,
    pub student_id: String,
    pub rank: i64,
}

fn ranking_order(a: &RankEntry, b: &RankEntry) -> Ordering {
    b.total_obtained
        .partial_cmp(&a.total_obtained)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.student_id.cmp(&b.student_id))
}

/// Competition ranking ("1224"): equal totals share a rank and the next
/// distinct total skips the places the tie consumed.
///
/// Output is in ranking order; exact ties are ordered by student id so the
/// result does not depend on input order.
pub fn competition_ranks(entries: &[RankEntry]) -> Vec<RankedEntry> {
    let mut sorted: Vec<&RankEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| ranking_order(a, b));

    let mut out = Vec::with_capacity(sorted.len());
    let mut prev_total: Option<f64> = None;
    let mut current_rank: i64 = 0;
    for (position, e) in sorted.into_iter().enumerate() {
        let tied = prev_total
            .map(|p| (p - e.total_obtained).abs() < TIE_EPSILON)
            .unwrap_or(false);
        if !tied {
            current_rank = position as i64 + 1;
        }
        prev_total = Some(e.total_obtained);
        out.push(RankedEntry {
            result_id: e.result_id.clone(),
            student_id: e.student_id.clone(),
            rank: current_rank,
        });
    }
    out
}

/// Listing order for results: ranked first by rank, then unranked; student
/// id breaks ties in both groups.
pub fn listing_order(a: (Option<i64>, &str), b: (Option<i64>, &str)) -> Ordering {
    match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(b.1)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.1.cmp(b.1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(student: &str, total: f64) -> RankEntry {
        RankEntry {
            result_id: format!("r-{student}"),
            student_id: student.to_string(),
            total_obtained: total,
        }
    }

    fn ranks_by_student(out: &[RankedEntry]) -> Vec<(&str, i64)> {
        out.iter().map(|r| (r.student_id.as_str(), r.rank)).collect()
    }

    #[test]
    fn equal_totals_share_rank_and_leave_a_gap() {
        let out = competition_ranks(&[
            entry("s3", 150.0),
            entry("s1", 180.0),
            entry("s2", 180.0),
        ]);
        assert_eq!(ranks_by_student(&out), vec![("s1", 1), ("s2", 1), ("s3", 3)]);
    }

    #[test]
    fn exact_ties_are_ordered_by_student_id_regardless_of_input_order() {
        let a = competition_ranks(&[entry("b", 10.0), entry("a", 10.0), entry("c", 10.0)]);
        let b = competition_ranks(&[entry("c", 10.0), entry("b", 10.0), entry("a", 10.0)]);
        assert_eq!(a, b);
        assert_eq!(ranks_by_student(&a), vec![("a", 1), ("b", 1), ("c", 1)]);
    }

    #[test]
    fn ranking_twice_yields_identical_assignments() {
        let input = vec![
            entry("s1", 88.5),
            entry("s2", 91.0),
            entry("s3", 88.5),
            entry("s4", 40.0),
        ];
        let once = competition_ranks(&input);
        let twice = competition_ranks(&input);
        assert_eq!(once, twice);
        assert_eq!(
            ranks_by_student(&once),
            vec![("s2", 1), ("s1", 2), ("s3", 2), ("s4", 4)]
        );
    }

    #[test]
    fn empty_exam_ranks_nothing() {
        assert!(competition_ranks(&[]).is_empty());
    }

    #[test]
    fn float_noise_does_not_split_a_tie() {
        let out = competition_ranks(&[entry("x", 0.1 + 0.2), entry("y", 0.3)]);
        assert_eq!(out[0].rank, 1);
        assert_eq!(out[1].rank, 1);
    }

    #[test]
    fn listing_puts_unranked_last() {
        let mut rows = vec![(None, "a"), (Some(2), "b"), (Some(1), "c"), (Some(2), "a")];
        rows.sort_by(|x, y| listing_order(*x, *y));
        assert_eq!(rows, vec![(Some(1), "c"), (Some(2), "a"), (Some(2), "b"), (None, "a")]);
    }
}
