//! Read-only view of the class roster and subject catalog.
//!
//! Both are owned by external collaborators; `sync_roster` is the single
//! entry point through which they push their current state into the
//! workspace. The exam engine only ever reads them.

use crate::db::now_rfc3339;
use crate::error::{EngineError, EngineResult};
use crate::exams::SubjectDef;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub id: String,
    pub name: String,
    pub admission_no: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    #[serde(default)]
    pub student_id: Option<String>,
    pub name: String,
    pub admission_no: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSync {
    pub tenant_id: String,
    #[serde(default)]
    pub class_id: Option<String>,
    pub class_name: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subjects: Option<Vec<SubjectDef>>,
    #[serde(default)]
    pub students: Vec<StudentInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedStudent {
    pub admission_no: String,
    pub student_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSyncOutcome {
    pub class_id: String,
    pub students: Vec<SyncedStudent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub class: ClassRef,
    pub subjects: Vec<SubjectDef>,
    pub students: Vec<RosterStudent>,
}

pub fn load_class(conn: &Connection, class_id: &str) -> EngineResult<ClassRef> {
    conn.query_row(
        "SELECT id, tenant_id, name, section FROM classes WHERE id = ?",
        [class_id],
        |r| {
            Ok(ClassRef {
                id: r.get(0)?,
                tenant_id: r.get(1)?,
                name: r.get(2)?,
                section: r.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("class", class_id))
}

/// Class lookup scoped to one tenant; a class owned by another tenant is
/// reported as missing.
pub fn load_class_for_tenant(
    conn: &Connection,
    tenant_id: &str,
    class_id: &str,
) -> EngineResult<ClassRef> {
    let class = load_class(conn, class_id)?;
    if class.tenant_id != tenant_id {
        return Err(EngineError::not_found("class", class_id));
    }
    Ok(class)
}

pub fn class_catalog(conn: &Connection, class_id: &str) -> EngineResult<Vec<SubjectDef>> {
    let mut stmt = conn.prepare(
        "SELECT name, max_marks FROM class_subjects WHERE class_id = ? ORDER BY idx",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(SubjectDef {
                subject_name: r.get(0)?,
                max_marks: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn class_students(conn: &Connection, class_id: &str) -> EngineResult<Vec<RosterStudent>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, admission_no, sort_order
         FROM students
         WHERE class_id = ?
         ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(RosterStudent {
                id: r.get(0)?,
                name: r.get(1)?,
                admission_no: r.get(2)?,
                sort_order: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn class_student_ids(conn: &Connection, class_id: &str) -> EngineResult<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT id FROM students WHERE class_id = ?")?;
    let ids = stmt
        .query_map([class_id], |r| r.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

pub fn get_roster(conn: &Connection, class_id: &str) -> EngineResult<Roster> {
    Ok(Roster {
        class: load_class(conn, class_id)?,
        subjects: class_catalog(conn, class_id)?,
        students: class_students(conn, class_id)?,
    })
}

fn non_empty(value: &str, field: &str) -> EngineResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(EngineError::validation(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

/// Upserts a class, replaces its subject catalog when one is supplied, and
/// upserts students matched by admission number. Students absent from the
/// payload are left untouched.
pub fn sync_roster(conn: &mut Connection, input: RosterSync) -> EngineResult<RosterSyncOutcome> {
    let tenant_id = non_empty(&input.tenant_id, "tenantId")?;
    let class_name = non_empty(&input.class_name, "className")?;
    let section = input
        .section
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let catalog = match &input.subjects {
        Some(subjects) if subjects.is_empty() => Some(Vec::new()),
        Some(subjects) => Some(crate::exams::validate_subjects(subjects)?),
        None => None,
    };

    let mut seen_admission = HashSet::new();
    for s in &input.students {
        let adm = non_empty(&s.admission_no, "admissionNo")?;
        non_empty(&s.name, "name")?;
        if !seen_admission.insert(adm.clone()) {
            return Err(EngineError::validation_with(
                "duplicate admissionNo in roster payload",
                serde_json::json!({ "admissionNo": adm }),
            ));
        }
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let now = now_rfc3339();

    let class_id = match input.class_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => {
            let existing: Option<String> = tx
                .query_row("SELECT tenant_id FROM classes WHERE id = ?", [id], |r| {
                    r.get(0)
                })
                .optional()?;
            match existing {
                Some(owner) if owner != tenant_id => {
                    return Err(EngineError::not_found("class", id));
                }
                Some(_) => {
                    tx.execute(
                        "UPDATE classes SET name = ?, section = ?, updated_at = ? WHERE id = ?",
                        (&class_name, &section, &now, id),
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO classes(id, tenant_id, name, section, updated_at)
                         VALUES(?, ?, ?, ?, ?)",
                        (id, &tenant_id, &class_name, &section, &now),
                    )?;
                }
            }
            id.to_string()
        }
        _ => {
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO classes(id, tenant_id, name, section, updated_at)
                 VALUES(?, ?, ?, ?, ?)",
                (&id, &tenant_id, &class_name, &section, &now),
            )?;
            id
        }
    };

    if let Some(catalog) = catalog {
        tx.execute("DELETE FROM class_subjects WHERE class_id = ?", [&class_id])?;
        for (i, s) in catalog.iter().enumerate() {
            tx.execute(
                "INSERT INTO class_subjects(class_id, idx, name, max_marks) VALUES(?, ?, ?, ?)",
                (&class_id, i as i64, &s.subject_name, s.max_marks),
            )?;
        }
    }

    let mut synced = Vec::with_capacity(input.students.len());
    for (i, s) in input.students.iter().enumerate() {
        let adm = s.admission_no.trim().to_string();
        let name = s.name.trim().to_string();
        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM students WHERE class_id = ? AND admission_no = ?",
                (&class_id, &adm),
                |r| r.get(0),
            )
            .optional()?;
        let student_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE students SET name = ?, sort_order = ?, updated_at = ? WHERE id = ?",
                    (&name, i as i64, &now, &id),
                )?;
                id
            }
            None => {
                let id = s
                    .student_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                tx.execute(
                    "INSERT INTO students(id, class_id, name, admission_no, sort_order, updated_at)
                     VALUES(?, ?, ?, ?, ?, ?)",
                    (&id, &class_id, &name, &adm, i as i64, &now),
                )?;
                id
            }
        };
        synced.push(SyncedStudent {
            admission_no: adm,
            student_id,
        });
    }

    tx.commit()?;
    tracing::info!(
        class_id = %class_id,
        students = synced.len(),
        "roster synced"
    );

    Ok(RosterSyncOutcome {
        class_id,
        students: synced,
    })
}
