//! Column mapping between Airtable rows and the rescue models.

use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{Photo, RescueAlert, RescuePatch, RescueStatus, RiskLevel, Skill, Volunteer};

use super::client::TableRecord;

// Bird Alerts columns
pub const ID: &str = "_id";
pub const SPECIES: &str = "Type of Bird";
pub const PICKUP: &str = "Full Pick Up Address";
pub const DROPOFF: &str = "Drop Off Address";
pub const STATUS: &str = "VolunteerStatus";
pub const RISK_LEVEL: &str = "R&T Level";
pub const SKILLS: &str = "Technical Skills";
pub const POSSIBLE_VOLUNTEERS: &str = "Possible Volunteers";
pub const CURRENT_VOLUNTEER: &str = "CurrentVolunteer";
pub const PHOTO: &str = "Bird Photo";

// Rescue and Transport Team columns
pub const VOLUNTEER_NAME: &str = "Name";

/// Read a column as display text. Lookup and rollup columns come back as
/// arrays; those are joined with ", ".
fn text(fields: &Map<String, Value>, name: &str) -> String {
    match fields.get(name) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// Read a multi-select or linked-record column as a list of strings,
/// dropping blanks and duplicates while keeping first-seen order.
fn string_list(fields: &Map<String, Value>, name: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let items = match fields.get(name) {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>(),
        Some(Value::String(s)) => vec![s.as_str()],
        _ => Vec::new(),
    };
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

fn record_id(record: &TableRecord) -> String {
    let formula_id = text(&record.fields, ID);
    if formula_id.is_empty() {
        record.id.clone()
    } else {
        formula_id
    }
}

fn photo(fields: &Map<String, Value>) -> Option<Photo> {
    let first = fields.get(PHOTO)?.as_array()?.first()?;
    let url = first.get("url")?.as_str()?.to_string();
    let dimension = |key: &str| {
        first
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    Some(Photo {
        url,
        width: dimension("width"),
        height: dimension("height"),
    })
}

/// Convert a Bird Alerts row. Returns `None` (and logs) when the status
/// column holds a value outside the four-step workflow.
pub fn rescue_from_record(record: &TableRecord) -> Option<RescueAlert> {
    let fields = &record.fields;
    let id = record_id(record);

    let status_label = text(fields, STATUS);
    let status = if status_label.is_empty() {
        RescueStatus::Pending
    } else {
        match RescueStatus::from_label(&status_label) {
            Some(status) => status,
            None => {
                warn!(id = %id, status = %status_label, "Skipping rescue with unknown status");
                return None;
            }
        }
    };

    let risk_label = text(fields, RISK_LEVEL);
    let risk_level = if risk_label.is_empty() {
        None
    } else {
        let level = RiskLevel::from_label(&risk_label);
        if level.is_none() {
            warn!(id = %id, level = %risk_label, "Unrecognized R&T level");
        }
        level
    };

    Some(RescueAlert {
        species: text(fields, SPECIES),
        pickup: text(fields, PICKUP),
        dropoff: text(fields, DROPOFF),
        status,
        risk_level,
        skills: string_list(fields, SKILLS).into_iter().map(Skill).collect(),
        eligible_volunteer_ids: string_list(fields, POSSIBLE_VOLUNTEERS),
        assigned_volunteer: text(fields, CURRENT_VOLUNTEER),
        photo: photo(fields),
        id,
    })
}

/// Convert a roster row. Rows without a name cannot be picked in the form
/// and are dropped.
pub fn volunteer_from_record(record: &TableRecord) -> Option<Volunteer> {
    let name = text(&record.fields, VOLUNTEER_NAME);
    if name.is_empty() {
        return None;
    }
    Some(Volunteer {
        id: record_id(record),
        name,
    })
}

/// Field map for a PATCH request.
pub fn patch_to_fields(patch: &RescuePatch) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(status) = patch.status {
        fields.insert(STATUS.to_string(), Value::String(status.label().to_string()));
    }
    if let Some(ref name) = patch.assigned_volunteer {
        fields.insert(CURRENT_VOLUNTEER.to_string(), Value::String(name.clone()));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> TableRecord {
        serde_json::from_value(value).expect("valid table record")
    }

    #[test]
    fn test_parse_full_rescue_row() {
        let rec = record(json!({
            "id": "recAirtable1",
            "createdTime": "2024-06-01T15:04:05.000Z",
            "fields": {
                "_id": "recAirtable1",
                "Type of Bird": "Red-tailed Hawk",
                "Full Pick Up Address": "123 Grand Ave, Des Moines, IA",
                "Drop Off Address": "Iowa Bird Rehabilitation, Ankeny, IA",
                "VolunteerStatus": "In Route",
                "R&T Level": "Purple: raptors",
                "Technical Skills": ["Raptor handling", "Net", "Raptor handling"],
                "Possible Volunteers": ["recVol1", "recVol2"],
                "CurrentVolunteer": "Dana Alvarez",
                "Bird Photo": [{
                    "id": "attX",
                    "url": "https://dl.airtable.com/hawk.jpg",
                    "filename": "hawk.jpg",
                    "width": 1024,
                    "height": 768
                }]
            }
        }));

        let alert = rescue_from_record(&rec).expect("rescue parses");
        assert_eq!(alert.id, "recAirtable1");
        assert_eq!(alert.species, "Red-tailed Hawk");
        assert_eq!(alert.pickup, "123 Grand Ave, Des Moines, IA");
        assert_eq!(alert.dropoff, "Iowa Bird Rehabilitation, Ankeny, IA");
        assert_eq!(alert.status, RescueStatus::InRoute);
        assert_eq!(alert.risk_level, Some(RiskLevel::Purple));
        assert_eq!(
            alert.skills,
            vec![Skill("Raptor handling".to_string()), Skill("Net".to_string())]
        );
        assert_eq!(alert.eligible_volunteer_ids, vec!["recVol1", "recVol2"]);
        assert_eq!(alert.assigned_volunteer, "Dana Alvarez");
        assert_eq!(
            alert.photo,
            Some(Photo {
                url: "https://dl.airtable.com/hawk.jpg".to_string(),
                width: 1024,
                height: 768,
            })
        );
    }

    #[test]
    fn test_sparse_row_defaults() {
        // Airtable omits empty cells entirely
        let rec = record(json!({"id": "recSparse", "fields": {"Type of Bird": "Sparrow"}}));
        let alert = rescue_from_record(&rec).expect("rescue parses");
        assert_eq!(alert.id, "recSparse");
        assert_eq!(alert.status, RescueStatus::Pending);
        assert!(alert.risk_level.is_none());
        assert!(alert.skills.is_empty());
        assert!(alert.eligible_volunteer_ids.is_empty());
        assert!(!alert.is_assigned());
        assert!(alert.photo.is_none());
    }

    #[test]
    fn test_unknown_status_is_skipped() {
        let rec = record(json!({"id": "recOld", "fields": {"VolunteerStatus": "Delivered - Released"}}));
        assert!(rescue_from_record(&rec).is_none());
    }

    #[test]
    fn test_lookup_array_is_joined() {
        let rec = record(json!({"id": "rec1", "fields": {"Drop Off Address": ["Clinic A", " ", "Annex"]}}));
        let alert = rescue_from_record(&rec).unwrap();
        assert_eq!(alert.dropoff, "Clinic A, Annex");
    }

    #[test]
    fn test_photo_without_dimensions() {
        let rec = record(json!({"id": "rec1", "fields": {"Bird Photo": [{"url": "https://x/y.png"}]}}));
        let alert = rescue_from_record(&rec).unwrap();
        let photo = alert.photo.expect("photo present");
        assert_eq!(photo.url, "https://x/y.png");
        assert_eq!((photo.width, photo.height), (0, 0));
    }

    #[test]
    fn test_volunteer_rows() {
        let rec = record(json!({"id": "recVol1", "fields": {"_id": "recVol1", "Name": "Dana Alvarez"}}));
        assert_eq!(
            volunteer_from_record(&rec),
            Some(Volunteer::new("recVol1", "Dana Alvarez"))
        );

        let nameless = record(json!({"id": "recVol9", "fields": {}}));
        assert!(volunteer_from_record(&nameless).is_none());
    }

    #[test]
    fn test_patch_to_fields() {
        let patch = RescuePatch::status(RescueStatus::InRoute).with_volunteer("Lee");
        let fields = patch_to_fields(&patch);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[STATUS], json!("In Route"));
        assert_eq!(fields[CURRENT_VOLUNTEER], json!("Lee"));

        let fields = patch_to_fields(&RescuePatch::status(RescueStatus::Rescued));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[STATUS], json!("Rescued"));
    }
}
