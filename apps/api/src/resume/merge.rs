//! State merge contract: applies a partial, possibly malformed agent update onto
//! the canonical document. Pure: it never fails and never touches shared state.
//!
//! Structured documents: `basics` is shallow-merged, list sections are replaced
//! wholesale when present, everything else is update-wins-if-present.
//! Markdown documents: full replacement, skipped when equal after trimming.

use serde_json::{Map, Value};

use crate::resume::models::{
    MarkdownResume, ResumeDocument, StructuredResume, StructuredUpdate,
};
use crate::resume::repair::{recover_json, unwrap_code_fence};

const PREVIEW_CHARS: usize = 160;
const MARKDOWN_KEYS: [&str; 2] = ["markdownResume", "markdown"];

/// An update as it reaches the merge step: already-structured, or raw agent text.
#[derive(Debug, Clone)]
pub enum UpdatePayload {
    Value(Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Applied(ResumeDocument),
    /// Valid update that leaves the document as it was.
    Unchanged,
    Rejected(String),
}

pub fn merge_update(current: &ResumeDocument, payload: UpdatePayload) -> MergeOutcome {
    match current {
        ResumeDocument::Markdown(doc) => merge_markdown(doc, payload),
        ResumeDocument::Structured(doc) => merge_structured(doc, payload),
    }
}

/// Full replacement from a direct edit. The value must describe a complete
/// document of the current variant.
pub fn replace_document(current: &ResumeDocument, value: Value) -> MergeOutcome {
    match current {
        ResumeDocument::Markdown(doc) => match serde_json::from_value::<MarkdownResume>(value) {
            Ok(next) if next.markdown_resume.trim() == doc.markdown_resume.trim() => {
                MergeOutcome::Unchanged
            }
            Ok(next) => MergeOutcome::Applied(ResumeDocument::Markdown(next)),
            Err(e) => MergeOutcome::Rejected(format!("document failed validation: {e}")),
        },
        ResumeDocument::Structured(doc) => {
            match serde_json::from_value::<StructuredResume>(value) {
                Ok(next) if &next == doc => MergeOutcome::Unchanged,
                Ok(next) => MergeOutcome::Applied(ResumeDocument::Structured(next)),
                Err(e) => MergeOutcome::Rejected(format!("document failed validation: {e}")),
            }
        }
    }
}

fn merge_structured(current: &StructuredResume, payload: UpdatePayload) -> MergeOutcome {
    let value = match payload {
        UpdatePayload::Text(text) | UpdatePayload::Value(Value::String(text)) => {
            match recover_json(&text) {
                Some(value) => value,
                None => {
                    return MergeOutcome::Rejected(format!(
                        "could not recover JSON from update: {}",
                        preview(&text)
                    ))
                }
            }
        }
        UpdatePayload::Value(value) => value,
    };

    let update: StructuredUpdate = match serde_json::from_value(value) {
        Ok(update) => update,
        Err(e) => return MergeOutcome::Rejected(format!("update failed validation: {e}")),
    };

    let mut next = current.clone();
    apply_structured(&mut next, update);
    if &next == current {
        MergeOutcome::Unchanged
    } else {
        MergeOutcome::Applied(ResumeDocument::Structured(next))
    }
}

fn apply_structured(doc: &mut StructuredResume, update: StructuredUpdate) {
    let StructuredUpdate {
        basics,
        summary,
        experience,
        education,
        projects,
        skills,
    } = update;

    if let Some(basics) = basics {
        doc.basics.merge_from(basics);
    }
    if let Some(summary) = summary {
        doc.summary = summary;
    }
    if let Some(experience) = experience {
        doc.experience = experience;
    }
    if let Some(education) = education {
        doc.education = education;
    }
    if let Some(projects) = projects {
        doc.projects = projects;
    }
    if let Some(skills) = skills {
        doc.skills = skills;
    }
}

fn merge_markdown(current: &MarkdownResume, payload: UpdatePayload) -> MergeOutcome {
    let replacement = match markdown_replacement(payload) {
        Ok(markdown) => markdown,
        Err(reason) => return MergeOutcome::Rejected(reason),
    };
    let replacement = match unwrap_code_fence(&replacement) {
        Some(inner) => inner.to_string(),
        None => replacement,
    };

    if replacement.trim() == current.markdown_resume.trim() {
        return MergeOutcome::Unchanged;
    }
    MergeOutcome::Applied(ResumeDocument::Markdown(MarkdownResume {
        markdown_resume: replacement,
    }))
}

/// Raw text is the markdown itself unless it carries a JSON object with a
/// markdown field. Structured values must be a string or such an object.
fn markdown_replacement(payload: UpdatePayload) -> Result<String, String> {
    match payload {
        UpdatePayload::Text(text) | UpdatePayload::Value(Value::String(text)) => {
            match recover_json(&text) {
                Some(Value::Object(fields)) if has_markdown_key(&fields) => {
                    markdown_field(fields)
                }
                _ => Ok(text),
            }
        }
        UpdatePayload::Value(Value::Object(fields)) => markdown_field(fields),
        UpdatePayload::Value(other) => Err(format!(
            "expected markdown text or an object with `markdownResume`, got: {}",
            preview(&other.to_string())
        )),
    }
}

fn has_markdown_key(fields: &Map<String, Value>) -> bool {
    MARKDOWN_KEYS.iter().any(|k| fields.contains_key(*k))
}

fn markdown_field(mut fields: Map<String, Value>) -> Result<String, String> {
    for key in MARKDOWN_KEYS {
        match fields.remove(key) {
            Some(Value::String(markdown)) => return Ok(markdown),
            Some(other) => {
                return Err(format!(
                    "update failed validation: `{key}` must be a string, got {other}"
                ))
            }
            None => continue,
        }
    }
    Err("update failed validation: missing `markdownResume`".to_string())
}

/// Bounded, char-safe excerpt of rejected input for logs.
fn preview(text: &str) -> String {
    let mut excerpt: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        excerpt.push_str("...");
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::models::{Basics, DocumentMode, ExperienceEntry};
    use serde_json::json;

    fn structured() -> ResumeDocument {
        ResumeDocument::Structured(StructuredResume {
            basics: Basics {
                name: Some("Jane Doe".into()),
                email: Some("jane@example.com".into()),
                ..Basics::default()
            },
            summary: "Backend engineer".into(),
            experience: vec![ExperienceEntry {
                company: "Acme".into(),
                role: "Engineer".into(),
                location: None,
                start_date: Some("2020".into()),
                end_date: None,
                highlights: vec!["Shipped billing".into()],
            }],
            skills: vec!["Rust".into(), "SQL".into()],
            ..StructuredResume::default()
        })
    }

    fn markdown(text: &str) -> ResumeDocument {
        ResumeDocument::Markdown(MarkdownResume {
            markdown_resume: text.to_string(),
        })
    }

    fn applied(outcome: MergeOutcome) -> StructuredResume {
        match outcome {
            MergeOutcome::Applied(ResumeDocument::Structured(doc)) => doc,
            other => panic!("expected structured Applied, got {other:?}"),
        }
    }

    #[test]
    fn test_unspecified_fields_untouched() {
        let doc = applied(merge_update(
            &structured(),
            UpdatePayload::Value(json!({"summary": "Staff engineer"})),
        ));
        assert_eq!(doc.summary, "Staff engineer");
        assert_eq!(doc.skills, vec!["Rust", "SQL"]);
        assert_eq!(doc.experience.len(), 1);
        assert_eq!(doc.basics.name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_lists_replaced_wholesale() {
        let doc = applied(merge_update(
            &structured(),
            UpdatePayload::Value(json!({"skills": ["Go"], "experience": []})),
        ));
        assert_eq!(doc.skills, vec!["Go"]);
        assert!(doc.experience.is_empty());
    }

    #[test]
    fn test_basics_shallow_merged() {
        let doc = applied(merge_update(
            &structured(),
            UpdatePayload::Value(json!({"basics": {"location": "Lisbon"}})),
        ));
        assert_eq!(doc.basics.name.as_deref(), Some("Jane Doe"));
        assert_eq!(doc.basics.email.as_deref(), Some("jane@example.com"));
        assert_eq!(doc.basics.location.as_deref(), Some("Lisbon"));
    }

    #[test]
    fn test_structured_update_is_idempotent() {
        let update = json!({"summary": "Staff engineer", "basics": {"headline": "Rustacean"}});
        let once = applied(merge_update(&structured(), UpdatePayload::Value(update.clone())));
        let once_doc = ResumeDocument::Structured(once.clone());

        assert_eq!(
            merge_update(&once_doc, UpdatePayload::Value(update)),
            MergeOutcome::Unchanged
        );
        assert_eq!(once.basics.headline.as_deref(), Some("Rustacean"));
    }

    #[test]
    fn test_agent_text_is_repaired() {
        let raw = "Updated your skills:\n```json\n{\"skills\": [\"Rust\", \"Kubernetes\",]}\n```";
        let doc = applied(merge_update(&structured(), UpdatePayload::Text(raw.into())));
        assert_eq!(doc.skills, vec!["Rust", "Kubernetes"]);
    }

    #[test]
    fn test_unparseable_text_is_rejected_with_preview() {
        let raw = "no json here ".repeat(40);
        match merge_update(&structured(), UpdatePayload::Text(raw)) {
            MergeOutcome::Rejected(reason) => {
                assert!(reason.contains("no json here"));
                assert!(reason.ends_with("..."));
                assert!(reason.len() < 260);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let outcome = merge_update(
            &structured(),
            UpdatePayload::Value(json!({"experience": "lots"})),
        );
        assert!(matches!(outcome, MergeOutcome::Rejected(reason) if reason.contains("validation")));
    }

    #[test]
    fn test_markdown_noop_guard() {
        let current = markdown("# Jane\n\n- Rust\n");
        let outcome = merge_update(
            &current,
            UpdatePayload::Text("  # Jane\n\n- Rust  \n\n".into()),
        );
        assert_eq!(outcome, MergeOutcome::Unchanged);
    }

    #[test]
    fn test_markdown_fence_is_unwrapped() {
        let outcome = merge_update(
            &markdown("# Old"),
            UpdatePayload::Text("```markdown\n# New\n\n- Rust\n```".into()),
        );
        assert_eq!(outcome, MergeOutcome::Applied(markdown("# New\n\n- Rust")));
    }

    #[test]
    fn test_markdown_from_agent_state_object() {
        let outcome = merge_update(
            &markdown("# Old"),
            UpdatePayload::Value(json!({"markdownResume": "# New"})),
        );
        assert_eq!(outcome, MergeOutcome::Applied(markdown("# New")));

        let outcome = merge_update(
            &markdown("# Old"),
            UpdatePayload::Text(r##"{"markdownResume": "# From text"}"##.into()),
        );
        assert_eq!(outcome, MergeOutcome::Applied(markdown("# From text")));
    }

    #[test]
    fn test_markdown_wrong_types_rejected() {
        let current = markdown("# Old");
        assert!(matches!(
            merge_update(&current, UpdatePayload::Value(json!({"markdownResume": 3}))),
            MergeOutcome::Rejected(_)
        ));
        assert!(matches!(
            merge_update(&current, UpdatePayload::Value(json!(["# New"]))),
            MergeOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_markdown_with_brackets_stays_markdown() {
        let text = "# Jane\n\n- Built [the site](https://jane.dev) in {Rust}";
        let outcome = merge_update(&markdown("# Old"), UpdatePayload::Text(text.into()));
        assert_eq!(outcome, MergeOutcome::Applied(markdown(text)));
    }

    #[test]
    fn test_replace_document_keeps_variant() {
        let current = markdown("# Old");
        assert_eq!(
            replace_document(&current, json!({"markdownResume": "# New"})),
            MergeOutcome::Applied(markdown("# New"))
        );
        assert_eq!(
            replace_document(&current, json!({"markdownResume": "# Old\n"})),
            MergeOutcome::Unchanged
        );
        assert!(matches!(
            replace_document(&current, json!({"summary": "x"})),
            MergeOutcome::Rejected(_)
        ));

        let outcome = replace_document(&structured(), json!({"summary": "Only this"}));
        let doc = applied(outcome);
        assert_eq!(doc.summary, "Only this");
        assert!(doc.skills.is_empty());
    }

    #[test]
    fn test_initial_documents_accept_their_own_variant() {
        let doc = ResumeDocument::initial(DocumentMode::Structured);
        let next = applied(merge_update(
            &doc,
            UpdatePayload::Value(json!({"basics": {"name": "Sam"}})),
        ));
        assert_eq!(next.basics.name.as_deref(), Some("Sam"));
    }
}
