use crate::config::PublishSettings;
use crate::db::now_rfc3339;
use crate::error::{EngineError, EngineResult};
use crate::exams;
use crate::ranking::{self, RankEntry};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use serde::Serialize;
use std::time::Duration;

const RETRY_BACKOFF_MS: u64 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankSummary {
    pub exam_id: String,
    pub ranked: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub exam_id: String,
    pub already_published: bool,
    pub ranked: usize,
    pub published_at: Option<String>,
}

/// Rewrites the rank of every result of one exam. Callers own the
/// transaction; this only reads and writes through `conn`.
fn apply_ranks(conn: &Connection, exam_id: &str) -> EngineResult<usize> {
    let mut stmt =
        conn.prepare("SELECT id, student_id, total_obtained FROM results WHERE exam_id = ?")?;
    let entries = stmt
        .query_map([exam_id], |r| {
            Ok(RankEntry {
                result_id: r.get(0)?,
                student_id: r.get(1)?,
                total_obtained: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let ranked = ranking::competition_ranks(&entries);
    let mut update = conn.prepare("UPDATE results SET rank = ? WHERE id = ?")?;
    for r in &ranked {
        update.execute((r.rank, &r.result_id))?;
    }
    Ok(ranked.len())
}

/// Explicit ranking pass over a draft exam.
pub fn recompute_ranks(conn: &mut Connection, exam_id: &str) -> EngineResult<RankSummary> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let exam = exams::load_exam(&tx, exam_id)?;
    if exam.is_published {
        tracing::warn!(exam_id = %exam_id, "rank recompute rejected: exam is published");
        return Err(EngineError::ExamLocked {
            exam_id: exam.id.clone(),
        });
    }
    let ranked = apply_ranks(&tx, &exam.id)?;
    tx.commit()?;
    Ok(RankSummary {
        exam_id: exam.id,
        ranked,
    })
}

fn publish_once(conn: &mut Connection, exam_id: &str) -> EngineResult<PublishOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Existence check first so an unknown id is a NotFound, not a no-op.
    let exam = exams::load_exam(&tx, exam_id)?;
    let published_at = now_rfc3339();
    let changed = tx.execute(
        "UPDATE exams SET is_published = 1, published_at = ?
         WHERE id = ? AND is_published = 0",
        (&published_at, &exam.id),
    )?;
    if changed == 0 {
        tx.commit()?;
        return Ok(PublishOutcome {
            exam_id: exam.id,
            already_published: true,
            ranked: 0,
            published_at: exam.published_at,
        });
    }
    let ranked = apply_ranks(&tx, &exam.id)?;
    tx.commit()?;
    Ok(PublishOutcome {
        exam_id: exam.id,
        already_published: false,
        ranked,
        published_at: Some(published_at),
    })
}

fn is_busy(e: &EngineError) -> bool {
    match e {
        EngineError::Database(rusqlite::Error::SqliteFailure(f, _)) => {
            matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}

/// Locks a draft exam: final rank pass and the Draft → Published flip
/// commit together. Publishing an already published exam succeeds without
/// touching anything and reports `already_published`.
pub fn publish_exam(
    conn: &mut Connection,
    exam_id: &str,
    settings: &PublishSettings,
) -> EngineResult<PublishOutcome> {
    let attempts = settings.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match publish_once(conn, exam_id) {
            Ok(outcome) => {
                if outcome.already_published {
                    tracing::info!(exam_id = %exam_id, "exam already published; no-op");
                } else {
                    tracing::info!(
                        exam_id = %exam_id,
                        ranked = outcome.ranked,
                        "exam published"
                    );
                }
                return Ok(outcome);
            }
            Err(e) if is_busy(&e) => {
                tracing::warn!(exam_id = %exam_id, attempt, "publish hit a busy database; retrying");
                last_err = Some(e);
                std::thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64));
            }
            Err(e) => return Err(e),
        }
    }
    let detail = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    tracing::error!(exam_id = %exam_id, attempts, error = %detail, "publish failed after retries");
    Err(EngineError::Internal(format!(
        "publish of exam {} failed after {} attempts: {}",
        exam_id, attempts, detail
    )))
}
