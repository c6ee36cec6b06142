use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{db_conn, db_conn_mut, required_str};
use crate::ipc::types::{AppState, Request};
use crate::publish;
use crate::results;
use serde_json::{json, Value};

fn handle_results_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let result_id = match required_str(req, "resultId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match results::load_result(conn, &result_id) {
        Ok((exam, result)) => ok(
            &req.id,
            json!({ "result": result, "isPublished": exam.is_published }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_results_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match results::list_results_for_exam(conn, &exam_id) {
        Ok((exam, list)) => ok(
            &req.id,
            json!({
                "examId": exam.id,
                "isPublished": exam.is_published,
                "results": list,
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_results_recompute_ranks(state: &mut AppState, req: &Request) -> Value {
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match publish::recompute_ranks(conn, &exam_id) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "results.get" => Some(handle_results_get(state, req)),
        "results.list" => Some(handle_results_list(state, req)),
        "results.recomputeRanks" => Some(handle_results_recompute_ranks(state, req)),
        _ => None,
    }
}
