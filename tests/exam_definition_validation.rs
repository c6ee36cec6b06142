mod test_support;

use serde_json::json;
use test_support::{error_code, Fixture};

fn exam_params(class_id: &str, subjects: serde_json::Value) -> serde_json::Value {
    json!({
        "tenantId": "t1",
        "classId": class_id,
        "examType": "Unit",
        "name": "Unit Test 1",
        "subjects": subjects,
        "startDate": "2026-04-01",
        "endDate": "2026-04-03"
    })
}

#[test]
fn subject_lists_are_validated_on_create() {
    let mut fx = Fixture::new("resultsd-exam-validate", &["A-1"]);
    let class_id = fx.class_id.clone();

    let dup = fx.call(
        "exams.create",
        exam_params(
            &class_id,
            json!([
                { "subjectName": "Math", "maxMarks": 100 },
                { "subjectName": "math", "maxMarks": 50 }
            ]),
        ),
    );
    assert_eq!(error_code(&dup), "duplicate_subject");

    let zero = fx.call(
        "exams.create",
        exam_params(&class_id, json!([{ "subjectName": "Math", "maxMarks": 0 }])),
    );
    assert_eq!(error_code(&zero), "validation_error");

    let empty = fx.call("exams.create", exam_params(&class_id, json!([])));
    assert_eq!(error_code(&empty), "validation_error");

    let mut backwards = exam_params(&class_id, json!([{ "subjectName": "Math", "maxMarks": 100 }]));
    backwards["endDate"] = json!("2026-03-01");
    let v = fx.call("exams.create", backwards);
    assert_eq!(error_code(&v), "validation_error");

    let mut other_class = exam_params("no-such-class", json!([{ "subjectName": "Math", "maxMarks": 100 }]));
    other_class["classId"] = json!("no-such-class");
    let v = fx.call("exams.create", other_class);
    assert_eq!(error_code(&v), "not_found");
}

#[test]
fn create_falls_back_to_class_catalog() {
    let mut fx = Fixture::new("resultsd-exam-catalog", &["A-1"]);
    let class_id = fx.class_id.clone();
    let mut params = exam_params(&class_id, json!(null));
    params.as_object_mut().expect("object").remove("subjects");
    let res = fx.call_ok("exams.create", params);
    let subjects = res["exam"]["subjects"].as_array().expect("subjects");
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0]["subjectName"], json!("Math"));
    assert_eq!(res["exam"]["isPublished"], json!(false));

    let listed = fx.call_ok("exams.list", json!({ "tenantId": "t1", "classId": class_id }));
    assert_eq!(listed["exams"].as_array().map(|a| a.len()), Some(1));
    let other = fx.call_ok("exams.list", json!({ "tenantId": "t2" }));
    assert_eq!(other["exams"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn subjects_freeze_once_marks_exist() {
    let mut fx = Fixture::new("resultsd-exam-freeze", &["A-1"]);
    let exam_id = fx.create_exam("Term 1");
    let student = fx.students[0].clone();

    let renamed = fx.call_ok(
        "exams.update",
        json!({ "examId": exam_id, "patch": { "name": "Term One" } }),
    );
    assert_eq!(renamed["exam"]["name"], json!("Term One"));

    fx.submit(
        &exam_id,
        json!([{ "studentId": student, "subject": "Math", "marksObtained": 40 }]),
    );
    let v = fx.call(
        "exams.update",
        json!({
            "examId": exam_id,
            "patch": { "subjects": [{ "subjectName": "History", "maxMarks": 100 }] }
        }),
    );
    assert_eq!(error_code(&v), "validation_error");

    let got = fx.call_ok("exams.get", json!({ "examId": exam_id }));
    assert_eq!(got["resultCount"], json!(1));
    assert_eq!(got["exam"]["subjects"][0]["subjectName"], json!("Math"));
}
