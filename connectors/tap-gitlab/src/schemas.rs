//! Record schemas for GitLab resources.

use serde_json::{json, Map, Value};

fn nullable(kind: &str) -> Value {
    json!({"type": [kind, "null"]})
}

fn datetime() -> Value {
    json!({"type": ["string", "null"], "format": "date-time"})
}

fn strings() -> Value {
    json!({"type": ["array", "null"], "items": {"type": "string"}})
}

fn object(properties: &[(&str, Value)]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| ((*name).to_string(), schema.clone()))
        .collect();
    json!({"type": "object", "properties": props})
}

fn user() -> Value {
    let mut schema = object(&[
        ("id", nullable("integer")),
        ("username", nullable("string")),
        ("name", nullable("string")),
        ("state", nullable("string")),
        ("web_url", nullable("string")),
    ]);
    schema["type"] = json!(["object", "null"]);
    schema
}

pub fn projects() -> Value {
    object(&[
        ("id", json!({"type": "integer"})),
        ("name", nullable("string")),
        ("path", nullable("string")),
        ("path_with_namespace", nullable("string")),
        ("description", nullable("string")),
        ("default_branch", nullable("string")),
        ("visibility", nullable("string")),
        ("web_url", nullable("string")),
        ("archived", nullable("boolean")),
        ("created_at", datetime()),
        ("last_activity_at", datetime()),
        ("star_count", nullable("integer")),
        ("forks_count", nullable("integer")),
        ("open_issues_count", nullable("integer")),
        ("tag_list", strings()),
        (
            "statistics",
            json!({
                "type": ["object", "null"],
                "properties": {
                    "commit_count": {"type": ["integer", "null"]},
                    "storage_size": {"type": ["integer", "null"]},
                    "repository_size": {"type": ["integer", "null"]}
                }
            }),
        ),
    ])
}

pub fn releases() -> Value {
    object(&[
        ("project_id", json!({"type": "string"})),
        ("commit_id", json!({"type": "string"})),
        ("tag_name", json!({"type": "string"})),
        ("name", nullable("string")),
        ("description", nullable("string")),
        ("created_at", datetime()),
        ("released_at", datetime()),
        ("author", user()),
        (
            "commit",
            json!({
                "type": ["object", "null"],
                "properties": {
                    "id": {"type": ["string", "null"]},
                    "short_id": {"type": ["string", "null"]},
                    "title": {"type": ["string", "null"]}
                }
            }),
        ),
    ])
}

pub fn issues() -> Value {
    object(&[
        ("id", json!({"type": "integer"})),
        ("iid", nullable("integer")),
        ("project_id", nullable("integer")),
        ("title", nullable("string")),
        ("description", nullable("string")),
        ("state", nullable("string")),
        ("created_at", datetime()),
        ("updated_at", datetime()),
        ("closed_at", datetime()),
        ("labels", strings()),
        ("author", user()),
        ("assignee", user()),
        ("milestone_id", nullable("integer")),
        ("user_notes_count", nullable("integer")),
        ("upvotes", nullable("integer")),
        ("downvotes", nullable("integer")),
        ("confidential", nullable("boolean")),
        ("web_url", nullable("string")),
    ])
}

pub fn commits() -> Value {
    object(&[
        ("id", json!({"type": "string"})),
        ("short_id", nullable("string")),
        ("title", nullable("string")),
        ("message", nullable("string")),
        ("author_name", nullable("string")),
        ("author_email", nullable("string")),
        ("authored_date", datetime()),
        ("committer_name", nullable("string")),
        ("committer_email", nullable("string")),
        ("committed_date", datetime()),
        ("created_at", datetime()),
        ("parent_ids", strings()),
        (
            "stats",
            json!({
                "type": ["object", "null"],
                "properties": {
                    "additions": {"type": ["integer", "null"]},
                    "deletions": {"type": ["integer", "null"]},
                    "total": {"type": ["integer", "null"]}
                }
            }),
        ),
    ])
}

pub fn epics() -> Value {
    let mut schema = object(&[
        ("id", json!({"type": "integer"})),
        ("iid", json!({"type": "integer"})),
        ("group_id", json!({"type": "integer"})),
        ("parent_id", nullable("integer")),
        ("title", nullable("string")),
        ("description", nullable("string")),
        ("state", nullable("string")),
        ("author_id", nullable("integer")),
        ("start_date", datetime()),
        ("end_date", datetime()),
        ("due_date", datetime()),
        ("created_at", datetime()),
        ("updated_at", datetime()),
        ("labels", json!({"type": "array", "items": {"type": "string"}})),
        ("upvotes", nullable("integer")),
        ("downvotes", nullable("integer")),
    ]);
    schema["required"] = json!(["id", "iid", "group_id", "labels"]);
    schema
}

pub fn epic_issues() -> Value {
    object(&[
        ("id", json!({"type": "integer"})),
        ("iid", nullable("integer")),
        ("project_id", nullable("integer")),
        ("epic_issue_id", nullable("integer")),
        ("title", nullable("string")),
        ("description", nullable("string")),
        ("state", nullable("string")),
        ("created_at", datetime()),
        ("updated_at", datetime()),
        ("closed_at", datetime()),
        ("labels", strings()),
        ("author", user()),
        ("web_url", nullable("string")),
    ])
}
