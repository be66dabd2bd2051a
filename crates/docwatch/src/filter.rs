//! Change-stream filter compilation.
//!
//! Change events wrap the user document in a `fullDocument` envelope, but
//! callers author filters against their own fields. [`compile`] bridges the
//! two: criteria filters become a `$match` pipeline stage whose field
//! references are rewritten with a `fullDocument.` prefix, while
//! pre-compiled pipelines pass through untouched.

use bson::{doc, Bson, Document};

const FULL_DOCUMENT_PREFIX: &str = "fullDocument.";

/// Filter attached to a change-stream subscription.
#[derive(Debug, Clone)]
pub enum StreamFilter {
    /// Structured match criteria over user-document fields. Compiled into a
    /// `$match` stage with `fullDocument.` field prefixing.
    Criteria(Document),
    /// A pre-compiled aggregation pipeline, passed to the cursor untouched.
    Pipeline(Vec<Document>),
}

impl StreamFilter {
    /// Creates a criteria filter over user-document fields.
    #[must_use]
    pub fn criteria(criteria: Document) -> Self {
        Self::Criteria(criteria)
    }

    /// Creates a pass-through filter from pre-compiled pipeline stages.
    #[must_use]
    pub fn pipeline(stages: Vec<Document>) -> Self {
        Self::Pipeline(stages)
    }
}

/// Compiles a filter into the pipeline handed to the change-stream cursor.
#[must_use]
pub(crate) fn compile(filter: &StreamFilter) -> Vec<Document> {
    match filter {
        StreamFilter::Criteria(criteria) => vec![doc! { "$match": prefix_document(criteria) }],
        StreamFilter::Pipeline(stages) => stages.clone(),
    }
}

/// Rewrites every field reference in `source` with the `fullDocument.`
/// prefix. Keys starting with `$` (operators) keep their name; values are
/// rewritten recursively, including documents nested inside arrays.
fn prefix_document(source: &Document) -> Document {
    let mut result = Document::new();
    for (key, value) in source {
        let key = if key.starts_with('$') {
            key.clone()
        } else {
            format!("{FULL_DOCUMENT_PREFIX}{key}")
        };
        result.insert(key, prefix_value(value));
    }
    result
}

fn prefix_value(value: &Bson) -> Bson {
    match value {
        Bson::Document(doc) => Bson::Document(prefix_document(doc)),
        Bson::Array(items) => Bson::Array(items.iter().map(prefix_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_compiles_to_match_stage() {
        let filter = StreamFilter::criteria(doc! { "value": "foo" });
        let pipeline = compile(&filter);
        assert_eq!(
            pipeline,
            vec![doc! { "$match": { "fullDocument.value": "foo" } }]
        );
    }

    #[test]
    fn test_pipeline_passes_through_untouched() {
        let stages = vec![
            doc! { "$match": { "operationType": "insert" } },
            doc! { "$project": { "fullDocument": 1 } },
        ];
        let filter = StreamFilter::pipeline(stages.clone());
        assert_eq!(compile(&filter), stages);
    }

    #[test]
    fn test_prefixing_keeps_operator_keys() {
        let source = doc! { "a": 1, "b.c": 2, "$comment": "x" };
        let prefixed = prefix_document(&source);
        assert_eq!(
            prefixed,
            doc! { "fullDocument.a": 1, "fullDocument.b.c": 2, "$comment": "x" }
        );
    }

    #[test]
    fn test_prefixing_recurses_into_operator_values() {
        let source = doc! { "age": { "$gt": 5 } };
        let prefixed = prefix_document(&source);
        assert_eq!(prefixed, doc! { "fullDocument.age": { "$gt": 5 } });
    }

    #[test]
    fn test_prefixing_rewrites_documents_inside_arrays() {
        let source = doc! {
            "$or": [
                { "value": "foo" },
                { "count": { "$lt": 3 } },
                42,
            ]
        };
        let prefixed = prefix_document(&source);
        assert_eq!(
            prefixed,
            doc! {
                "$or": [
                    { "fullDocument.value": "foo" },
                    { "fullDocument.count": { "$lt": 3 } },
                    42,
                ]
            }
        );
    }

    #[test]
    fn test_prefixing_recurses_into_nested_documents() {
        let source = doc! { "$and": [ { "$or": [ { "a": 1 } ] } ] };
        let prefixed = prefix_document(&source);
        assert_eq!(
            prefixed,
            doc! { "$and": [ { "$or": [ { "fullDocument.a": 1 } ] } ] }
        );
    }
}
