use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{db_conn, db_conn_mut, parse_params, required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, RosterSync};
use serde_json::{json, Value};

fn handle_roster_sync(state: &mut AppState, req: &Request) -> Value {
    let input: RosterSync = match parse_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match roster::sync_roster(conn, input) {
        Ok(outcome) => ok(&req.id, json!(outcome)),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_roster_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match roster::get_roster(conn, &class_id) {
        Ok(r) => ok(&req.id, json!(r)),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "roster.sync" => Some(handle_roster_sync(state, req)),
        "roster.get" => Some(handle_roster_get(state, req)),
        _ => None,
    }
}
