//! Prompt construction for the vision classification adapter
//!
//! The decision tree is generated from the schema tables so the prompt's
//! dropdown options can never drift from what the normalizer accepts.

use crate::model::Coordinates;
use crate::schema;

/// Fixed framing for the classification call
const PROMPT_HEADER: &str = "You are a civic infrastructure damage detector for a municipal \
reporting system. Analyze this image and decide whether it shows a reportable civic issue.

STEP 1 - FILTER OUT NON-CIVIC ISSUES. Return category=\"None\" for: indoor scenes, personal \
items (phones, food, clothing, people, pets), nature scenes without infrastructure, or \
normal undamaged infrastructure.

STEP 2 - IDENTIFY THE ISSUE CATEGORY. Choose exactly one category that matches the actual \
damage you see:
- \"Road Crack\": potholes, cracks, holes in road/pavement, shifted construction plates, \
manhole covers. NOT sidewalks or curbs.
- \"Sidewalk Crack\": cracks, breaks, lifted/collapsed surfaces in sidewalks, curb damage. \
NOT roads or vehicle surfaces.
- \"Graffiti\": spray paint, tags, unauthorized markings, illegal postings. NOT normal \
signage or murals.
- \"Overflowing Trash\": overflowing public trash receptacles.
- \"Faded Street Markings\": worn or illegible lane/crosswalk markings.
- \"Broken Street Light\": damaged or non-functioning street lights.
- \"Fallen Tree\": fallen trees, damaged/dead/hanging limbs, trees damaging property. NOT \
healthy standing trees.

STEP 3 - SELECT FORM FIELDS FROM THE EXACT DROPDOWN OPTIONS BELOW. Pick the single most \
fitting option for each field; copy option strings verbatim.";

const PROMPT_FOOTER: &str = "STEP 4 - RESPOND WITH THIS EXACT JSON STRUCTURE:
{
  \"category\": \"<one of the categories above, or None>\",
  \"Text_Description\": \"<detailed description of the damage for a civic report>\",
  \"confidence\": <0.0 for None, 0.6-1.0 for issues based on visibility>,
  \"locationDescription\": \"<specific location, e.g. 'center of right lane'>\",
  \"formFields\": { <fields from the decision tree for the chosen category> }
}";

fn push_options(out: &mut String, label: &str, options: &[&str]) {
    out.push_str(label);
    out.push_str(" options:\n");
    for option in options {
        out.push_str("  - \"");
        out.push_str(option);
        out.push_str("\"\n");
    }
}

/// Build the full classification prompt for an image taken at `coordinates`
pub fn build_classification_prompt(coordinates: Coordinates) -> String {
    let mut out = String::with_capacity(4096);

    out.push_str(PROMPT_HEADER);
    out.push_str(&format!(
        "\n\nThe image was taken at coordinates {}.\n\n",
        coordinates
    ));

    // Road / street
    out.push_str("CATEGORY \"Road Crack\" formFields: {\"damageType\": \"pothole\", \
\"issueType\": \"Street\", \"requestType\": <option>, \"requestDescription\": <text>}\n");
    push_options(&mut out, "requestType", schema::STREET_REQUEST_TYPES);
    out.push('\n');

    // Sidewalk
    out.push_str("CATEGORY \"Sidewalk Crack\" formFields: {\"damageType\": \"sidewalk\", \
\"issueType\": \"Sidewalk/Curb\", \"requestType\": <option>, \"secondaryRequestType\": \
<option, only when requestType is \"Sidewalk Defect\">, \"requestDescription\": <text>}\n");
    push_options(&mut out, "requestType", schema::SIDEWALK_REQUEST_TYPES);
    push_options(
        &mut out,
        "secondaryRequestType (when requestType = \"Sidewalk Defect\")",
        schema::SIDEWALK_SECONDARY_TYPES,
    );
    out.push('\n');

    // Graffiti
    out.push_str("CATEGORY \"Graffiti\" formFields: {\"issueType\": <option>, \
\"requestRegarding\": <option>, \"requestType\": <option>, \"requestDescription\": <text>}\n\
First decide whether the graffiti is on private or public property, or whether the issue \
is an illegal posting.\n");
    push_options(&mut out, "issueType", schema::GRAFFITI_ISSUE_TYPES);
    push_options(
        &mut out,
        "requestRegarding (graffiti issue types)",
        schema::GRAFFITI_REGARDING,
    );
    push_options(
        &mut out,
        "requestType (Graffiti on Private Property)",
        schema::GRAFFITI_PRIVATE_TYPES,
    );
    push_options(
        &mut out,
        "requestType (Graffiti on Public Property)",
        schema::GRAFFITI_PUBLIC_TYPES,
    );
    push_options(
        &mut out,
        "requestRegarding (Illegal Postings on Public Property; requestType is always \"Pole\")",
        schema::POSTING_REGARDING,
    );
    out.push('\n');

    // Trees
    out.push_str("CATEGORY \"Fallen Tree\" formFields: {\"requestRegarding\": <option>, \
\"requestType\": <option from the list matching requestRegarding>, \"requestDescription\": \
<text>}\n");
    push_options(&mut out, "requestRegarding", schema::TREE_REGARDING);
    push_options(
        &mut out,
        "requestType (Damaged Tree)",
        schema::TREE_DAMAGED_TYPES,
    );
    push_options(
        &mut out,
        "requestType (Damaging Property)",
        schema::TREE_PROPERTY_TYPES,
    );
    push_options(
        &mut out,
        "requestType (Landscaping)",
        schema::TREE_LANDSCAPING_TYPES,
    );
    push_options(
        &mut out,
        "requestType (Overgrown Tree)",
        schema::TREE_OVERGROWN_TYPES,
    );
    out.push_str("requestType for requestRegarding \"Other\" is \"N/A\".\n");

    // Categories with no dropdowns
    out.push_str(
        "\nCATEGORIES \"Overflowing Trash\", \"Faded Street Markings\" and \"Broken Street \
Light\" formFields: {\"requestDescription\": <text>}\n\n",
    );

    out.push_str(PROMPT_FOOTER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_every_schema_option() {
        let prompt = build_classification_prompt(Coordinates {
            latitude: 37.7749,
            longitude: -122.4194,
        });

        for option in schema::STREET_REQUEST_TYPES
            .iter()
            .chain(schema::SIDEWALK_REQUEST_TYPES)
            .chain(schema::SIDEWALK_SECONDARY_TYPES)
            .chain(schema::GRAFFITI_ISSUE_TYPES)
            .chain(schema::GRAFFITI_PUBLIC_TYPES)
            .chain(schema::TREE_REGARDING)
            .chain(schema::TREE_DAMAGED_TYPES)
        {
            assert!(prompt.contains(option), "prompt is missing option {option:?}");
        }

        assert!(prompt.contains("37.7749"));
    }
}
