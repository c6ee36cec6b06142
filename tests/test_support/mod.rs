#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

pub fn error_code(value: &Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

/// A sidecar bound to a fresh workspace with one class of students.
pub struct Fixture {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    pub workspace: PathBuf,
    pub class_id: String,
    /// Student ids in admission-number order.
    pub students: Vec<String>,
    next_id: usize,
}

impl Fixture {
    pub fn new(prefix: &str, admission_nos: &[&str]) -> Self {
        let workspace = temp_dir(prefix);
        let (child, mut stdin, mut reader) = spawn_sidecar();
        request_ok(
            &mut stdin,
            &mut reader,
            "select",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let students: Vec<Value> = admission_nos
            .iter()
            .map(|adm| json!({ "name": format!("Student {adm}"), "admissionNo": adm }))
            .collect();
        let synced = request_ok(
            &mut stdin,
            &mut reader,
            "sync",
            "roster.sync",
            json!({
                "tenantId": "t1",
                "className": "Grade 8",
                "section": "B",
                "subjects": [
                    { "subjectName": "Math", "maxMarks": 100 },
                    { "subjectName": "Science", "maxMarks": 100 }
                ],
                "students": students
            }),
        );
        let class_id = synced["classId"].as_str().expect("classId").to_string();
        let students = synced["students"]
            .as_array()
            .expect("students")
            .iter()
            .map(|s| s["studentId"].as_str().expect("studentId").to_string())
            .collect();
        Self {
            child,
            stdin,
            reader,
            workspace,
            class_id,
            students,
            next_id: 0,
        }
    }

    fn next(&mut self) -> String {
        self.next_id += 1;
        format!("r{}", self.next_id)
    }

    pub fn call(&mut self, method: &str, params: Value) -> Value {
        let id = self.next();
        request(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn call_ok(&mut self, method: &str, params: Value) -> Value {
        let id = self.next();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    /// Creates a Math/Science exam (100 marks each) and returns its id.
    pub fn create_exam(&mut self, name: &str) -> String {
        let class_id = self.class_id.clone();
        let res = self.call_ok(
            "exams.create",
            json!({
                "tenantId": "t1",
                "classId": class_id,
                "examType": "Term",
                "name": name,
                "subjects": [
                    { "subjectName": "Math", "maxMarks": 100 },
                    { "subjectName": "Science", "maxMarks": 100 }
                ],
                "startDate": "2026-03-02",
                "endDate": "2026-03-06"
            }),
        );
        res["exam"]["id"].as_str().expect("exam id").to_string()
    }

    pub fn submit(&mut self, exam_id: &str, entries: Value) -> Value {
        self.call_ok(
            "marks.submit",
            json!({ "examId": exam_id, "entries": entries }),
        )
    }

    pub fn result_for(&mut self, exam_id: &str, student_id: &str) -> Value {
        let listed = self.call_ok("results.list", json!({ "examId": exam_id }));
        listed["results"]
            .as_array()
            .expect("results")
            .iter()
            .find(|r| r["studentId"].as_str() == Some(student_id))
            .cloned()
            .expect("result for student")
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
