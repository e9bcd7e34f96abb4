//! Adapter payload assembly and contract checking
//!
//! Every automation script receives a flat JSON object: four base keys shared
//! by all scripts plus the normalized per-category form fields. The payload is
//! checked against the script's declared key contract before dispatch so a
//! malformed payload never reaches a browser session.

use serde_json::{Map, Value};

use crate::model::Coordinates;
use crate::schema::StructuredFields;
use crate::submit::process::DispatchFailure;

/// Keys every automation script expects, regardless of category
pub const BASE_CONTRACT_KEYS: &[&str] = &[
    "coordinates",
    "locationDescription",
    "requestDescription",
    "imagePath",
];

/// Build the flat payload object for one dispatch
pub fn build_payload(
    coordinates: Coordinates,
    location_description: &str,
    image_path: &str,
    fields: &StructuredFields,
) -> Value {
    let mut payload = Map::new();
    payload.insert("coordinates".to_string(), coordinates.formatted().into());
    payload.insert(
        "locationDescription".to_string(),
        location_description.into(),
    );
    payload.insert(
        "requestDescription".to_string(),
        fields.request_description().into(),
    );
    payload.insert("imagePath".to_string(), image_path.into());

    // Per-category fields are merged flat alongside the base keys
    for (key, value) in fields.to_object() {
        payload.insert(key, value);
    }

    Value::Object(payload)
}

/// Verify the payload carries every key the script's contract requires
pub fn check_contract(payload: &Value, contract: &[String]) -> Result<(), DispatchFailure> {
    let Some(object) = payload.as_object() else {
        return Err(DispatchFailure::ContractViolation(contract.to_vec()));
    };

    let missing: Vec<String> = contract
        .iter()
        .filter(|key| !object.contains_key(key.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DispatchFailure::ContractViolation(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StreetFields;

    fn street_fields() -> StructuredFields {
        StructuredFields::Street(StreetFields {
            damage_type: "pothole",
            issue_type: "Street",
            request_type: "Pothole/Pavement Defect".to_string(),
            request_description: "Deep pothole in the right lane".to_string(),
        })
    }

    #[test]
    fn payload_merges_base_keys_with_category_fields() {
        let coords = Coordinates {
            latitude: 37.7793,
            longitude: -122.4193,
        };
        let payload = build_payload(coords, "Near the bus stop", "/tmp/img.jpg", &street_fields());
        let object = payload.as_object().unwrap();

        assert_eq!(object["coordinates"], "37.7793, -122.4193");
        assert_eq!(object["locationDescription"], "Near the bus stop");
        assert_eq!(object["requestDescription"], "Deep pothole in the right lane");
        assert_eq!(object["imagePath"], "/tmp/img.jpg");
        assert_eq!(object["requestType"], "Pothole/Pavement Defect");
        assert_eq!(object["damageType"], "pothole");
        assert_eq!(object["issueType"], "Street");
    }

    #[test]
    fn contract_check_passes_when_all_keys_present() {
        let coords = Coordinates {
            latitude: 37.7793,
            longitude: -122.4193,
        };
        let payload = build_payload(coords, "loc", "/tmp/img.jpg", &street_fields());
        let contract: Vec<String> = BASE_CONTRACT_KEYS
            .iter()
            .chain(["damageType", "issueType", "requestType"].iter())
            .map(|s| s.to_string())
            .collect();

        assert!(check_contract(&payload, &contract).is_ok());
    }

    #[test]
    fn contract_check_names_every_missing_key() {
        let payload = serde_json::json!({"coordinates": "0, 0"});
        let contract: Vec<String> = BASE_CONTRACT_KEYS.iter().map(|s| s.to_string()).collect();

        let err = check_contract(&payload, &contract).unwrap_err();
        match err {
            DispatchFailure::ContractViolation(missing) => {
                assert_eq!(
                    missing,
                    vec!["locationDescription", "requestDescription", "imagePath"]
                );
            }
            other => panic!("unexpected failure: {other}"),
        }
    }
}
