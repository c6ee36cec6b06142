use crate::calc::{self, SubjectLine};
use crate::config::IntakeSettings;
use crate::db::now_rfc3339;
use crate::error::{EngineError, EngineResult};
use crate::exams::{self, Exam};
use crate::results;
use crate::roster;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct MarkEntry {
    pub student_id: String,
    pub subject: String,
    pub marks_obtained: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryError {
    pub index: usize,
    pub student_id: Option<String>,
    pub subject: Option<String>,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeOutcome {
    pub exam_id: String,
    pub updated: Vec<String>,
    pub errors: Vec<EntryError>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntakeOptions {
    /// Any entry error rejects the whole batch.
    pub atomic: bool,
}

impl IntakeOptions {
    pub fn resolve(requested: Option<bool>, settings: &IntakeSettings) -> Self {
        Self {
            atomic: requested.unwrap_or(settings.default_atomic),
        }
    }
}

/// Shape-checks raw JSON entries one at a time so a malformed entry is
/// reported against its own index instead of failing the batch.
pub fn parse_entries(raw: &[serde_json::Value]) -> Vec<Result<MarkEntry, EntryError>> {
    raw.iter()
        .enumerate()
        .map(|(index, v)| {
            let student_id = v
                .get("studentId")
                .and_then(|x| x.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let subject = v
                .get("subject")
                .and_then(|x| x.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let marks = v.get("marksObtained").and_then(|x| x.as_f64());

            let fail = |message: &str| EntryError {
                index,
                student_id: student_id.clone(),
                subject: subject.clone(),
                code: "validation_error",
                message: message.to_string(),
            };

            if !v.is_object() {
                return Err(fail("entry must be an object"));
            }
            let Some(sid) = student_id.clone() else {
                return Err(fail("entry missing studentId"));
            };
            let Some(subj) = subject.clone() else {
                return Err(fail("entry missing subject"));
            };
            let Some(m) = marks else {
                return Err(fail("marksObtained must be a number"));
            };
            Ok(MarkEntry {
                student_id: sid,
                subject: subj,
                marks_obtained: m,
            })
        })
        .collect()
}

fn check_entry(
    exam: &Exam,
    roster_ids: &std::collections::HashSet<String>,
    index: usize,
    entry: &MarkEntry,
) -> Result<(String, f64), EntryError> {
    let fail = |code: &'static str, message: String| EntryError {
        index,
        student_id: Some(entry.student_id.clone()),
        subject: Some(entry.subject.clone()),
        code,
        message,
    };

    if !roster_ids.contains(&entry.student_id) {
        return Err(fail(
            "not_found",
            "student is not on the exam class roster".to_string(),
        ));
    }
    let Some(subject_idx) = exam.subject_index(&entry.subject) else {
        return Err(fail(
            "validation_error",
            format!("subject {} is not defined on this exam", entry.subject),
        ));
    };
    let subject = &exam.subjects[subject_idx];
    let m = entry.marks_obtained;
    if !m.is_finite() || m < 0.0 || m > subject.max_marks {
        return Err(fail(
            "validation_error",
            format!(
                "marksObtained must be in 0..={} for {}",
                calc::format_marks(subject.max_marks),
                subject.subject_name
            ),
        ));
    }
    Ok((subject.subject_name.clone(), m))
}

fn ensure_result(conn: &Connection, exam: &Exam, student_id: &str) -> EngineResult<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM results WHERE exam_id = ? AND student_id = ?",
            (&exam.id, student_id),
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO results(id, exam_id, student_id, class_id, total_max, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, &exam.id, student_id, &exam.class_id, exam.total_max(), now_rfc3339()),
    )?;
    Ok(id)
}

fn upsert_score(
    conn: &Connection,
    result_id: &str,
    subject: &str,
    marks_obtained: f64,
) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO result_scores(result_id, subject_name, marks_obtained)
         VALUES(?, ?, ?)
         ON CONFLICT(result_id, subject_name) DO UPDATE SET
           marks_obtained = excluded.marks_obtained",
        (result_id, subject, marks_obtained),
    )?;
    Ok(())
}

/// Recomputes and stores the derived fields of one result from its stored
/// scores and the exam's subject table.
pub fn rescore_result(conn: &Connection, exam: &Exam, result_id: &str) -> EngineResult<()> {
    let stored = results::stored_scores(conn, result_id)?;
    let summary = calc::score_result(exam.subjects.iter().map(|s| SubjectLine {
        max_marks: s.max_marks,
        obtained: stored
            .iter()
            .find(|(k, _)| exams::same_subject(k, &s.subject_name))
            .map(|(_, v)| *v),
    }));
    conn.execute(
        "UPDATE results
         SET total_obtained = ?, total_max = ?, percentage = ?, grade = ?, status = ?,
             updated_at = ?
         WHERE id = ?",
        (
            summary.total_obtained,
            summary.total_max,
            summary.percentage,
            summary.grade.as_str(),
            summary.status.as_str(),
            now_rfc3339(),
            result_id,
        ),
    )?;
    Ok(())
}

/// Upserts a batch of marks for one draft exam.
///
/// The exam row is re-read inside an IMMEDIATE transaction, so a concurrent
/// publish either commits first (and this call fails with `ExamLocked`) or
/// waits until this batch has fully committed. Touched results are rescored
/// before commit and every rank of the exam is cleared.
pub fn submit_marks(
    conn: &mut Connection,
    exam_id: &str,
    entries: &[Result<MarkEntry, EntryError>],
    settings: &IntakeSettings,
    opts: IntakeOptions,
) -> EngineResult<IntakeOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let exam = exams::load_exam(&tx, exam_id)?;
    if exam.is_published {
        tracing::warn!(exam_id = %exam_id, "marks rejected: exam is published");
        return Err(EngineError::ExamLocked {
            exam_id: exam.id.clone(),
        });
    }
    if entries.len() > settings.max_entries {
        return Err(EngineError::validation_with(
            format!(
                "batch exceeds max entries: {} > {}",
                entries.len(),
                settings.max_entries
            ),
            json!({ "entryCount": entries.len(), "maxEntries": settings.max_entries }),
        ));
    }

    let roster_ids = roster::class_student_ids(&tx, &exam.class_id)?;
    let mut errors: Vec<EntryError> = Vec::new();
    let mut accepted: Vec<(String, String, f64)> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match entry {
            Err(e) => errors.push(e.clone()),
            Ok(entry) => match check_entry(&exam, &roster_ids, index, entry) {
                Ok((subject, marks)) => {
                    accepted.push((entry.student_id.clone(), subject, marks))
                }
                Err(e) => errors.push(e),
            },
        }
    }

    if opts.atomic && !errors.is_empty() {
        return Err(EngineError::validation_with(
            "batch rejected: one or more entries are invalid",
            json!({ "errors": errors }),
        ));
    }

    let mut result_ids: HashMap<String, String> = HashMap::new();
    let mut updated: Vec<String> = Vec::new();
    for (student_id, subject, marks) in &accepted {
        let result_id = match result_ids.get(student_id) {
            Some(id) => id.clone(),
            None => {
                let id = ensure_result(&tx, &exam, student_id)?;
                result_ids.insert(student_id.clone(), id.clone());
                updated.push(id.clone());
                id
            }
        };
        upsert_score(&tx, &result_id, subject, *marks)?;
    }

    for result_id in &updated {
        rescore_result(&tx, &exam, result_id)?;
    }
    if !updated.is_empty() {
        tx.execute("UPDATE results SET rank = NULL WHERE exam_id = ?", [&exam.id])?;
    }
    tx.commit()?;

    tracing::debug!(
        exam_id = %exam.id,
        entries = entries.len(),
        results = updated.len(),
        rejected = errors.len(),
        "marks batch applied"
    );

    Ok(IntakeOutcome {
        exam_id: exam.id,
        updated,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_entries_reports_shape_errors_per_index() {
        let raw = vec![
            json!({ "studentId": "s1", "subject": "Math", "marksObtained": 40 }),
            json!({ "studentId": "s1", "subject": "Math" }),
            json!("not an object"),
            json!({ "subject": "Math", "marksObtained": 3 }),
        ];
        let parsed = parse_entries(&raw);
        assert_eq!(
            parsed[0],
            Ok(MarkEntry {
                student_id: "s1".into(),
                subject: "Math".into(),
                marks_obtained: 40.0
            })
        );
        let errs: Vec<usize> = parsed
            .iter()
            .filter_map(|r| r.as_ref().err().map(|e| e.index))
            .collect();
        assert_eq!(errs, vec![1, 2, 3]);
        assert_eq!(
            parsed[1].as_ref().err().map(|e| e.message.as_str()),
            Some("marksObtained must be a number")
        );
    }

    #[test]
    fn explicit_atomic_flag_overrides_setting() {
        let s = IntakeSettings {
            max_entries: 10,
            default_atomic: true,
        };
        assert!(IntakeOptions::resolve(None, &s).atomic);
        assert!(!IntakeOptions::resolve(Some(false), &s).atomic);
    }
}
