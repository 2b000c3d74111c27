//! Prompt text for the two model calls.

pub const CYPHER_SYSTEM: &str = "You translate questions into a single read-only Cypher \
statement for a Neo4j graph. Reply with the statement only.";

const CYPHER_TEMPLATE: &str = r#"Task:
Generate a Cypher query for a Neo4j graph database.

Instructions:
Use only the relationship types and properties provided in the schema.
Do not use any other relationship types or properties.

Schema:
{schema}

Note:
Do not include any explanations or apologies in your response.
Do not respond to questions that ask for anything other than a Cypher statement.
Do not include any text except the generated Cypher statement.
Make sure the direction of each relationship is correct.
Alias every returned entity and relationship (e.g. RETURN p.name AS product_name).
Never write queries that add to, change or delete from the database.
Alias everything passed through WITH (e.g. WITH c AS content, p.name AS product_name).
If you divide numbers, filter the denominator to be non-zero.

Examples:
# Latest published content from each web source.
MATCH (w:WebSource)-[:PUBLISHED]->(c:Content)
WITH w.id AS web_source, MAX(c.published_date) AS latest_date
RETURN web_source, latest_date

# Products mentioned in content published by 'THERALASE PRESS RELEASE'.
MATCH (w:WebSource {id: "THERALASE PRESS RELEASE"})-[:PUBLISHED]->(c:Content)-[:HAS]->(p:Product)
RETURN DISTINCT p.name AS product_name

# Targets linked to the product 'TLD-1433'.
MATCH (p:Product {name: "TLD-1433"})-[:FOR]->(t:Target)
RETURN t.name AS target_name

# How many contents mention each product.
MATCH (c:Content)-[:HAS]->(p:Product)
RETURN p.name AS product_name, COUNT(c) AS mentions
ORDER BY mentions DESC

# Content titles that mention a specific target.
MATCH (c:Content)-[:HAS]->(:Product)-[:FOR]->(t:Target {name: "Ruthenium-based photosensitizer"})
RETURN c.title AS content_title

String values:
Use existing strings and values from the schema.

The question is:
{question}"#;

pub const ANSWER_SYSTEM: &str = "You read the results of a Cypher query run against a Neo4j \
graph and give a helpful, human-readable answer based only on them.";

const ANSWER_TEMPLATE: &str = r#"Query Results:
{context}

Question:
{question}

Guidelines:
- Use only the query results above. Do not use outside knowledge.
- Explain the values as a helpful answer instead of restating raw data.
- If the question mentions dates or durations, assume days unless the data says otherwise.
- Keep punctuation in names intact; 'Jones, Brown and Murray' is one entity.
- Present several items as a bullet list or comma-separated, whichever reads better.
- Do not say "based on the data provided" or similar boilerplate.
- Never say information is missing when results are present.

Helpful Answer:"#;

pub fn cypher_prompt(schema: &str, question: &str) -> String {
    CYPHER_TEMPLATE
        .replace("{schema}", schema)
        .replace("{question}", question)
}

pub fn answer_prompt(context: &str, question: &str) -> String {
    ANSWER_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled() {
        let prompt = cypher_prompt("Node properties:\nProduct {name: STRING}", "Which targets?");
        assert!(prompt.contains("Product {name: STRING}"));
        assert!(prompt.ends_with("Which targets?"));
        assert!(!prompt.contains("{schema}"));

        let answer = answer_prompt("[{\"t\":\"x\"}]", "q?");
        assert!(answer.contains("[{\"t\":\"x\"}]"));
        assert!(!answer.contains("{context}"));
    }
}
