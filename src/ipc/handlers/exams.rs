use crate::config;
use crate::exams::{self, ExamPatch, NewExam};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{db_conn, db_conn_mut, optional_str, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::publish;
use serde_json::{json, Value};

fn handle_exams_create(state: &mut AppState, req: &Request) -> Value {
    let input: NewExam = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match exams::create_exam(conn, input) {
        Ok(exam) => ok(&req.id, json!({ "exam": exam })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_exams_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam = match exams::load_exam(conn, &exam_id) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, &e),
    };
    match exams::result_count(conn, &exam_id) {
        Ok(n) => ok(&req.id, json!({ "exam": exam, "resultCount": n })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_exams_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let tenant_id = match required_str(req, "tenantId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match optional_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match exams::list_exams(conn, &tenant_id, class_id.as_deref()) {
        Ok(list) => ok(&req.id, json!({ "exams": list })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_exams_update(state: &mut AppState, req: &Request) -> Value {
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw_patch) = req.params.get("patch").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    let patch: ExamPatch = match serde_json::from_value(raw_patch.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match exams::update_exam(conn, &exam_id, patch) {
        Ok(exam) => ok(&req.id, json!({ "exam": exam })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_exams_publish(state: &mut AppState, req: &Request) -> Value {
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let settings = match config::publish_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match publish::publish_exam(conn, &exam_id, &settings) {
        Ok(outcome) => ok(&req.id, json!(outcome)),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.get" => Some(handle_exams_get(state, req)),
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.update" => Some(handle_exams_update(state, req)),
        "exams.publish" => Some(handle_exams_publish(state, req)),
        _ => None,
    }
}
