use crate::calc::{self, Grade, PassStatus};
use crate::error::{EngineError, EngineResult};
use crate::exams::{self, Exam};
use crate::ranking;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    pub subject: String,
    pub marks_obtained: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    pub class_id: String,
    pub student_name: String,
    pub admission_no: String,
    pub subject_scores: Vec<SubjectScore>,
    pub total_obtained: f64,
    pub total_max: f64,
    pub percentage: f64,
    pub percentage_display: String,
    pub grade: Grade,
    pub status: PassStatus,
    pub rank: Option<i64>,
}

impl ExamResult {
    pub fn score_for(&self, subject: &str) -> Option<f64> {
        self.subject_scores
            .iter()
            .find(|s| exams::same_subject(&s.subject, subject))
            .map(|s| s.marks_obtained)
    }
}

#[derive(Debug)]
struct ResultRow {
    id: String,
    exam_id: String,
    student_id: String,
    class_id: String,
    student_name: String,
    admission_no: String,
    total_obtained: f64,
    total_max: f64,
    percentage: f64,
    grade: String,
    status: String,
    rank: Option<i64>,
}

const RESULT_SELECT: &str = "SELECT r.id, r.exam_id, r.student_id, r.class_id,
        s.name, s.admission_no,
        r.total_obtained, r.total_max, r.percentage, r.grade, r.status, r.rank
     FROM results r
     JOIN students s ON s.id = r.student_id";

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: r.get(0)?,
        exam_id: r.get(1)?,
        student_id: r.get(2)?,
        class_id: r.get(3)?,
        student_name: r.get(4)?,
        admission_no: r.get(5)?,
        total_obtained: r.get(6)?,
        total_max: r.get(7)?,
        percentage: r.get(8)?,
        grade: r.get(9)?,
        status: r.get(10)?,
        rank: r.get(11)?,
    })
}

/// Stored scores for one result, keyed by subject name.
pub fn stored_scores(conn: &Connection, result_id: &str) -> EngineResult<HashMap<String, f64>> {
    let mut stmt =
        conn.prepare("SELECT subject_name, marks_obtained FROM result_scores WHERE result_id = ?")?;
    let rows = stmt
        .query_map([result_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

/// Orders stored scores by the exam's subject order. Scores for subjects the
/// exam no longer defines are dropped.
fn ordered_scores(exam: &Exam, stored: &HashMap<String, f64>) -> Vec<SubjectScore> {
    exam.subjects
        .iter()
        .filter_map(|s| {
            stored
                .iter()
                .find(|(k, _)| exams::same_subject(k, &s.subject_name))
                .map(|(_, v)| SubjectScore {
                    subject: s.subject_name.clone(),
                    marks_obtained: *v,
                })
        })
        .collect()
}

fn hydrate(conn: &Connection, exam: &Exam, row: ResultRow) -> EngineResult<ExamResult> {
    let stored = stored_scores(conn, &row.id)?;
    let grade = Grade::parse(&row.grade).ok_or_else(|| {
        EngineError::Internal(format!("result {} has unknown grade {}", row.id, row.grade))
    })?;
    let status = PassStatus::parse(&row.status).ok_or_else(|| {
        EngineError::Internal(format!("result {} has unknown status {}", row.id, row.status))
    })?;
    Ok(ExamResult {
        subject_scores: ordered_scores(exam, &stored),
        percentage_display: calc::format_percent(row.percentage),
        id: row.id,
        exam_id: row.exam_id,
        student_id: row.student_id,
        class_id: row.class_id,
        student_name: row.student_name,
        admission_no: row.admission_no,
        total_obtained: row.total_obtained,
        total_max: row.total_max,
        percentage: row.percentage,
        grade,
        status,
        rank: row.rank,
    })
}

pub fn load_result(conn: &Connection, result_id: &str) -> EngineResult<(Exam, ExamResult)> {
    let sql = format!("{RESULT_SELECT} WHERE r.id = ?");
    let row = conn.query_row(&sql, [result_id], map_row).optional()?;
    let Some(row) = row else {
        return Err(EngineError::not_found("result", result_id));
    };
    let exam = exams::load_exam(conn, &row.exam_id)?;
    let result = hydrate(conn, &exam, row)?;
    Ok((exam, result))
}

/// All results of one exam: ranked by rank ascending, then unranked, with
/// student id breaking ties.
pub fn list_results(conn: &Connection, exam: &Exam) -> EngineResult<Vec<ExamResult>> {
    let sql = format!("{RESULT_SELECT} WHERE r.exam_id = ?");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([&exam.id], map_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = rows
        .into_iter()
        .map(|row| hydrate(conn, exam, row))
        .collect::<EngineResult<Vec<_>>>()?;
    out.sort_by(|a, b| {
        ranking::listing_order(
            (a.rank, a.student_id.as_str()),
            (b.rank, b.student_id.as_str()),
        )
    });
    Ok(out)
}

pub fn list_results_for_exam(
    conn: &Connection,
    exam_id: &str,
) -> EngineResult<(Exam, Vec<ExamResult>)> {
    let exam = exams::load_exam(conn, exam_id)?;
    let results = list_results(conn, &exam)?;
    Ok((exam, results))
}
