use crate::config;
use crate::intake::{self, IntakeOptions};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{db_conn_mut, optional_bool, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_marks_submit(state: &mut AppState, req: &Request) -> Value {
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing entries[]", None);
    };
    let atomic = match optional_bool(req, "atomic") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let settings = match config::intake_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let entries = intake::parse_entries(raw);
    let opts = IntakeOptions::resolve(atomic, &settings);
    match intake::submit_marks(conn, &exam_id, &entries, &settings, opts) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "examId": outcome.exam_id,
                "updated": outcome.updated,
                "rejected": outcome.errors.len(),
                "errors": outcome.errors,
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "marks.submit" => Some(handle_marks_submit(state, req)),
        _ => None,
    }
}
