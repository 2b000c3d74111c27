use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use ai_client::{truncate_to_char_boundary, OpenAi, StructuredOutput};
use pressgraph_common::{ExtractionError, ExtractionRecord, RawExtraction};

use crate::traits::{ArticleExtractor, RenderedPage};

const MAX_CONTENT_BYTES: usize = 30_000;

/// Products the extractor recognizes, each with its target.
pub const PRODUCT_TARGETS: &[(&str, &str)] = &[
    ("BCG Tice", "Bacterial immunopotentiator"),
    ("Adstiladrin", "Non-replicating AAV with IFN alpha2b gene"),
    ("Vicineum", "Anti-ECAM exotoxin A fusion protein"),
    ("Keytruda", "Anti-PD-1 mAb"),
    ("Pembrolizumab", "Anti-PD-1 mAb"),
    ("UGN-102", "D- synthesis inhibitor"),
    (
        "CG0070 + Keytruda",
        "Oncolytic adenovirus immunotherapy + Anti-PD-1 mAb",
    ),
    ("VesAnktiva + BCG", "IL-15 superagonist fusion protein"),
    ("EG-70", "IL-12 non-viral gene therapy"),
    ("Erdafitinib", "FGFR inhibitor"),
    ("TAR-200", "Gemcitabine-releasing intravesical system"),
    ("TLD-1433", "Ruthenium-based photosensitizer"),
    ("Enfortumab Vedotin", "Nectin-4-directed"),
    ("TARA-002", "TLR-4 agonists"),
];

/// Wire shape of the structured response.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ArticleBatch {
    /// Articles found on the page; normally exactly one.
    pub articles: Vec<ExtractionRecord>,
}

/// Strict JSON schema sent with every extraction call.
pub fn extraction_schema() -> serde_json::Value {
    ArticleBatch::strict_schema()
}

/// Instruction naming the fields and the recognized product/target pairs.
pub fn extraction_instruction() -> String {
    let catalogue: Vec<String> = PRODUCT_TARGETS
        .iter()
        .map(|(product, target)| format!("    '{product}': '{target}'"))
        .collect();
    format!(
        "Extract 'headline' and a short 'summary' from the content.\n\
         Get the 'published_date' from the content such that it has day, month and year. \
         Check thoroughly near the headline.\n\n\
         IMPORTANT: Answer only from the provided content. Do not make up any information \
         or invent an example.\n\n\
         Products and their targets that should be recognized:\n{}\n\
         If any of these products or targets are mentioned in the article, extract them into \
         'product' and 'target'. Otherwise return an empty string for those fields.\n\n\
         Return exactly one complete article in 'articles' with all fields filled.",
        catalogue.join(",\n")
    )
}

// --- LLM extractor ---

pub struct LlmExtractor {
    ai: OpenAi,
}

impl LlmExtractor {
    pub fn new(ai: OpenAi) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl ArticleExtractor for LlmExtractor {
    async fn extract(
        &self,
        page: &RenderedPage,
        schema: &serde_json::Value,
        instruction: &str,
    ) -> Result<RawExtraction, ExtractionError> {
        let content = page.markdown.trim();
        if content.is_empty() {
            return Ok(RawExtraction::Empty);
        }
        let content = truncate_to_char_boundary(content, MAX_CONTENT_BYTES);
        let user = format!("Source URL: {}\n\n---\n\n{content}", page.url);

        let text = self
            .ai
            .structured_output(instruction, &user, schema.clone())
            .await
            .map_err(|e| ExtractionError::Call {
                url: page.url.clone(),
                message: e.to_string(),
            })?;

        debug!(url = page.url.as_str(), model = self.ai.model(), bytes = text.len(), "Extraction response");
        Ok(unwrap_batch(&text))
    }
}

/// Structured responses wrap the records in `{"articles": [...]}`; anything
/// else is decoded as-is.
pub fn unwrap_batch(text: &str) -> RawExtraction {
    match RawExtraction::decode(text) {
        RawExtraction::Single(serde_json::Value::Object(mut map)) if map.contains_key("articles") => {
            RawExtraction::from_value(map.remove("articles").unwrap_or_default())
        }
        other => other,
    }
}
