use crate::bundle;
use crate::config;
use crate::error::EngineError;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, Artifact};
use serde_json::{json, Value};
use std::path::Path;

fn write_out(out_path: &Option<String>, artifact: &Artifact) -> Result<(), EngineError> {
    let Some(p) = out_path else {
        return Ok(());
    };
    let path = Path::new(p);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &artifact.bytes)?;
    Ok(())
}

fn handle_report_card(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let result_id = match required_str(req, "resultId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match optional_str(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match config::report_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let (result, artifact) = match report::render_report_card(conn, &result_id, &settings) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, &e),
    };
    if let Err(e) = write_out(&out_path, &artifact) {
        return engine_err(&req.id, &e);
    }
    ok(
        &req.id,
        json!({
            "resultId": result.id,
            "text": artifact.text(),
            "byteLength": artifact.bytes.len(),
            "sha256": artifact.sha256_hex(),
            "outPath": out_path,
        }),
    )
}

fn handle_result_sheet(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match optional_str(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match config::report_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let artifact = match report::render_result_sheet(conn, &exam_id, &settings) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, &e),
    };
    if let Err(e) = write_out(&out_path, &artifact) {
        return engine_err(&req.id, &e);
    }
    ok(
        &req.id,
        json!({
            "examId": exam_id,
            "text": artifact.text(),
            "byteLength": artifact.bytes.len(),
            "pageCount": artifact.page_count(),
            "sha256": artifact.sha256_hex(),
            "outPath": out_path,
        }),
    )
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match config::report_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match bundle::export_report_bundle(conn, &exam_id, Path::new(&out_path), &settings) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "outPath": out_path,
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.reportCard" => Some(handle_report_card(state, req)),
        "reports.resultSheet" => Some(handle_result_sheet(state, req)),
        "reports.exportBundle" => Some(handle_export_bundle(state, req)),
        _ => None,
    }
}
