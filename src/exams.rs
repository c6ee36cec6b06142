use crate::db::now_rfc3339;
use crate::error::{EngineError, EngineResult};
use crate::roster;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Comparison key for subject names: trimmed, Unicode lowercase. Every
/// subject match and duplicate check goes through this.
pub fn subject_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn same_subject(a: &str, b: &str) -> bool {
    subject_key(a) == subject_key(b)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDef {
    pub subject_name: String,
    pub max_marks: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub tenant_id: String,
    pub class_id: String,
    pub exam_type: String,
    pub name: String,
    pub subjects: Vec<SubjectDef>,
    pub start_date: String,
    pub end_date: String,
    pub is_published: bool,
    pub published_at: Option<String>,
}

impl Exam {
    pub fn total_max(&self) -> f64 {
        self.subjects.iter().map(|s| s.max_marks).sum()
    }

    /// Case-insensitive subject lookup; returns the subject's position.
    pub fn subject_index(&self, name: &str) -> Option<usize> {
        let needle = subject_key(name);
        self.subjects
            .iter()
            .position(|s| subject_key(&s.subject_name) == needle)
    }

    pub fn ensure_draft(&self) -> EngineResult<()> {
        if self.is_published {
            return Err(EngineError::ExamLocked {
                exam_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExam {
    pub tenant_id: String,
    pub class_id: String,
    pub exam_type: String,
    pub name: String,
    #[serde(default)]
    pub subjects: Option<Vec<SubjectDef>>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPatch {
    pub exam_type: Option<String>,
    pub name: Option<String>,
    pub subjects: Option<Vec<SubjectDef>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Normalizes an exam subject list: names trimmed and unique
/// (case-insensitive), max marks finite and positive, at least one subject.
pub fn validate_subjects(subjects: &[SubjectDef]) -> EngineResult<Vec<SubjectDef>> {
    if subjects.is_empty() {
        return Err(EngineError::validation("subjects must not be empty"));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(subjects.len());
    for (i, s) in subjects.iter().enumerate() {
        let name = s.subject_name.trim();
        if name.is_empty() {
            return Err(EngineError::validation_with(
                "subjectName must not be empty",
                serde_json::json!({ "index": i }),
            ));
        }
        if !s.max_marks.is_finite() || s.max_marks <= 0.0 {
            return Err(EngineError::validation_with(
                "maxMarks must be > 0",
                serde_json::json!({ "subject": name, "maxMarks": s.max_marks }),
            ));
        }
        if !seen.insert(subject_key(name)) {
            return Err(EngineError::DuplicateSubject {
                subject: name.to_string(),
            });
        }
        out.push(SubjectDef {
            subject_name: name.to_string(),
            max_marks: s.max_marks,
        });
    }
    Ok(out)
}

fn parse_date(raw: &str, field: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        EngineError::validation_with(
            format!("{} must be a YYYY-MM-DD date", field),
            serde_json::json!({ field: raw }),
        )
    })
}

pub fn validate_schedule(start: &str, end: &str) -> EngineResult<(NaiveDate, NaiveDate)> {
    let start_date = parse_date(start, "startDate")?;
    let end_date = parse_date(end, "endDate")?;
    if end_date < start_date {
        return Err(EngineError::validation_with(
            "endDate must not be before startDate",
            serde_json::json!({ "startDate": start, "endDate": end }),
        ));
    }
    Ok((start_date, end_date))
}

fn required_text(value: &str, field: &str) -> EngineResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(EngineError::validation(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

fn load_subjects(conn: &Connection, exam_id: &str) -> EngineResult<Vec<SubjectDef>> {
    let mut stmt =
        conn.prepare("SELECT name, max_marks FROM exam_subjects WHERE exam_id = ? ORDER BY idx")?;
    let rows = stmt
        .query_map([exam_id], |r| {
            Ok(SubjectDef {
                subject_name: r.get(0)?,
                max_marks: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn write_subjects(conn: &Connection, exam_id: &str, subjects: &[SubjectDef]) -> EngineResult<()> {
    conn.execute("DELETE FROM exam_subjects WHERE exam_id = ?", [exam_id])?;
    for (i, s) in subjects.iter().enumerate() {
        conn.execute(
            "INSERT INTO exam_subjects(exam_id, idx, name, max_marks) VALUES(?, ?, ?, ?)",
            (exam_id, i as i64, &s.subject_name, s.max_marks),
        )?;
    }
    Ok(())
}

pub fn load_exam(conn: &Connection, exam_id: &str) -> EngineResult<Exam> {
    let row = conn
        .query_row(
            "SELECT id, tenant_id, class_id, exam_type, name, start_date, end_date,
                    is_published, published_at
             FROM exams
             WHERE id = ?",
            [exam_id],
            |r| {
                Ok(Exam {
                    id: r.get(0)?,
                    tenant_id: r.get(1)?,
                    class_id: r.get(2)?,
                    exam_type: r.get(3)?,
                    name: r.get(4)?,
                    subjects: Vec::new(),
                    start_date: r.get(5)?,
                    end_date: r.get(6)?,
                    is_published: r.get::<_, i64>(7)? != 0,
                    published_at: r.get(8)?,
                })
            },
        )
        .optional()?;
    let Some(mut exam) = row else {
        return Err(EngineError::not_found("exam", exam_id));
    };
    exam.subjects = load_subjects(conn, exam_id)?;
    Ok(exam)
}

pub fn create_exam(conn: &mut Connection, input: NewExam) -> EngineResult<Exam> {
    let tenant_id = required_text(&input.tenant_id, "tenantId")?;
    let exam_type = required_text(&input.exam_type, "examType")?;
    let name = required_text(&input.name, "name")?;
    let (start_date, end_date) = validate_schedule(&input.start_date, &input.end_date)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let class = roster::load_class_for_tenant(&tx, &tenant_id, input.class_id.trim())?;
    let subjects = match &input.subjects {
        Some(list) => validate_subjects(list)?,
        None => {
            let catalog = roster::class_catalog(&tx, &class.id)?;
            if catalog.is_empty() {
                return Err(EngineError::validation(
                    "subjects must not be empty (class has no subject catalog)",
                ));
            }
            validate_subjects(&catalog)?
        }
    };

    let exam_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO exams(id, tenant_id, class_id, exam_type, name, start_date, end_date,
                           is_published, published_at, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)",
        (
            &exam_id,
            &tenant_id,
            &class.id,
            &exam_type,
            &name,
            start_date.format(DATE_FORMAT).to_string(),
            end_date.format(DATE_FORMAT).to_string(),
            now_rfc3339(),
        ),
    )?;
    write_subjects(&tx, &exam_id, &subjects)?;
    let exam = load_exam(&tx, &exam_id)?;
    tx.commit()?;

    tracing::info!(
        exam_id = %exam.id,
        class_id = %exam.class_id,
        subjects = exam.subjects.len(),
        "exam created"
    );
    Ok(exam)
}

pub fn list_exams(
    conn: &Connection,
    tenant_id: &str,
    class_id: Option<&str>,
) -> EngineResult<Vec<Exam>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM exams
         WHERE tenant_id = ?1 AND (?2 IS NULL OR class_id = ?2)
         ORDER BY start_date, name, id",
    )?;
    let ids = stmt
        .query_map((tenant_id, class_id), |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter().map(|id| load_exam(conn, id)).collect()
}

pub fn result_count(conn: &Connection, exam_id: &str) -> EngineResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM results WHERE exam_id = ?",
        [exam_id],
        |r| r.get(0),
    )?)
}

/// Applies a patch to a draft exam. The subject list is frozen as soon as
/// any result references the exam.
pub fn update_exam(conn: &mut Connection, exam_id: &str, patch: ExamPatch) -> EngineResult<Exam> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let exam = load_exam(&tx, exam_id)?;
    exam.ensure_draft()?;

    let exam_type = match &patch.exam_type {
        Some(v) => required_text(v, "examType")?,
        None => exam.exam_type.clone(),
    };
    let name = match &patch.name {
        Some(v) => required_text(v, "name")?,
        None => exam.name.clone(),
    };
    let start = patch.start_date.as_deref().unwrap_or(&exam.start_date);
    let end = patch.end_date.as_deref().unwrap_or(&exam.end_date);
    let (start_date, end_date) = validate_schedule(start, end)?;

    if let Some(list) = &patch.subjects {
        let subjects = validate_subjects(list)?;
        if subjects != exam.subjects {
            if result_count(&tx, exam_id)? > 0 {
                return Err(EngineError::validation_with(
                    "subjects are frozen once marks exist",
                    serde_json::json!({ "examId": exam_id }),
                ));
            }
            write_subjects(&tx, exam_id, &subjects)?;
        }
    }

    tx.execute(
        "UPDATE exams SET exam_type = ?, name = ?, start_date = ?, end_date = ? WHERE id = ?",
        (
            &exam_type,
            &name,
            start_date.format(DATE_FORMAT).to_string(),
            end_date.format(DATE_FORMAT).to_string(),
            exam_id,
        ),
    )?;
    let updated = load_exam(&tx, exam_id)?;
    tx.commit()?;
    Ok(updated)
}
