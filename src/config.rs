use crate::db;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Intake,
    Reports,
    Publish,
}

impl SetupSection {
    pub const ALL: [SetupSection; 3] = [
        SetupSection::Intake,
        SetupSection::Reports,
        SetupSection::Publish,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intake" => Some(Self::Intake),
            "reports" => Some(Self::Reports),
            "publish" => Some(Self::Publish),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Reports => "reports",
            Self::Publish => "publish",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Intake => "setup.intake",
            Self::Reports => "setup.reports",
            Self::Publish => "setup.publish",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Intake => json!({
            "maxEntries": 5000,
            "defaultAtomic": false
        }),
        SetupSection::Reports => json!({
            "schoolName": "",
            "showRank": true
        }),
        SetupSection::Publish => json!({
            "maxAttempts": 3
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Intake => match k.as_str() {
                "maxEntries" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 20000)?));
                }
                "defaultAtomic" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown intake field: {}", k)),
            },
            SetupSection::Reports => match k.as_str() {
                "schoolName" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 60)?));
                }
                "showRank" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
            SetupSection::Publish => match k.as_str() {
                "maxAttempts" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 10)?));
                }
                _ => return Err(format!("unknown publish field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

pub fn update_section(
    conn: &Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn, section)?;
    if let Err(msg) = merge_section_patch(section, &mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, section.key(), &current)?;
    Ok(Ok(current))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeSettings {
    pub max_entries: usize,
    pub default_atomic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub school_name: String,
    pub show_rank: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSettings {
    pub max_attempts: u32,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            max_entries: 5000,
            default_atomic: false,
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            school_name: String::new(),
            show_rank: true,
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

pub fn intake_settings(conn: &Connection) -> anyhow::Result<IntakeSettings> {
    let v = load_section(conn, SetupSection::Intake)?;
    let d = IntakeSettings::default();
    Ok(IntakeSettings {
        max_entries: v
            .get("maxEntries")
            .and_then(|x| x.as_u64())
            .map(|n| n as usize)
            .unwrap_or(d.max_entries),
        default_atomic: v
            .get("defaultAtomic")
            .and_then(|x| x.as_bool())
            .unwrap_or(d.default_atomic),
    })
}

pub fn report_settings(conn: &Connection) -> anyhow::Result<ReportSettings> {
    let v = load_section(conn, SetupSection::Reports)?;
    let d = ReportSettings::default();
    Ok(ReportSettings {
        school_name: v
            .get("schoolName")
            .and_then(|x| x.as_str())
            .map(|s| s.to_string())
            .unwrap_or(d.school_name),
        show_rank: v
            .get("showRank")
            .and_then(|x| x.as_bool())
            .unwrap_or(d.show_rank),
    })
}

pub fn publish_settings(conn: &Connection) -> anyhow::Result<PublishSettings> {
    let v = load_section(conn, SetupSection::Publish)?;
    Ok(PublishSettings {
        max_attempts: v
            .get("maxAttempts")
            .and_then(|x| x.as_u64())
            .map(|n| n as u32)
            .unwrap_or(PublishSettings::default().max_attempts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rejects_unknown_and_out_of_range_fields() {
        let mut current = default_section(SetupSection::Intake);
        let bad = json!({ "maxEntries": 0 });
        assert!(merge_section_patch(
            SetupSection::Intake,
            &mut current,
            bad.as_object().expect("object")
        )
        .is_err());

        let unknown = json!({ "colour": "red" });
        let e = merge_section_patch(
            SetupSection::Reports,
            &mut current,
            unknown.as_object().expect("object"),
        )
        .expect_err("unknown field");
        assert!(e.contains("unknown reports field"));
    }

    #[test]
    fn saved_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = db::open_db(dir.path()).expect("open");
        assert_eq!(
            intake_settings(&conn).expect("intake"),
            IntakeSettings::default()
        );

        let patch = json!({ "maxEntries": 2, "defaultAtomic": true });
        update_section(&conn, SetupSection::Intake, patch.as_object().expect("object"))
            .expect("db")
            .expect("valid patch");
        let s = intake_settings(&conn).expect("intake");
        assert_eq!(s.max_entries, 2);
        assert!(s.default_atomic);

        let patch = json!({ "schoolName": "  Hillview Public School " });
        update_section(&conn, SetupSection::Reports, patch.as_object().expect("object"))
            .expect("db")
            .expect("valid patch");
        assert_eq!(
            report_settings(&conn).expect("reports").school_name,
            "Hillview Public School"
        );
    }
}
