use std::sync::LazyLock;

use regex::Regex;

/// String literals, quoted identifiers and comments, blanked before the
/// write-clause scan so their contents cannot trigger it.
static OPAQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|`[^`]*`|//[^\n]*|/\*(?s:.*?)\*/"#)
        .expect("valid regex")
});

/// Clauses and procedures that can change data or schema. A preceding `.`
/// or word character means a property or identifier, not a clause.
static WRITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^.\w])(CREATE|MERGE|DELETE|DETACH|SET|REMOVE|DROP|FOREACH|LOAD\s+CSV|IN\s+TRANSACTIONS|CALL\s+(?:dbms|db\.create|apoc\.(?:create|merge|refactor|periodic|do|cypher\.run)))\b",
    )
    .expect("valid regex")
});

/// Strip code fences, a leading `cypher` tag and a trailing semicolon.
pub fn clean_cypher(generated: &str) -> String {
    let mut text = ai_client::strip_code_blocks(generated).trim();
    if let Some(rest) = text.strip_prefix("cypher").or_else(|| text.strip_prefix("Cypher")) {
        if rest.starts_with(char::is_whitespace) {
            text = rest.trim_start();
        }
    }
    text.trim_end_matches(';').trim().to_string()
}

/// `Err` names the first offending clause.
pub fn ensure_read_only(cypher: &str) -> Result<(), String> {
    if cypher.trim().is_empty() {
        return Err("generated query is empty".to_string());
    }
    let scrubbed = OPAQUE_RE.replace_all(cypher, " ");
    if scrubbed.contains(';') {
        return Err("generated query contains more than one statement".to_string());
    }
    if let Some(caps) = WRITE_RE.captures(&scrubbed) {
        let clause = caps.get(1).map_or("", |m| m.as_str());
        return Err(format!("generated query contains a write clause ({})", clause.to_uppercase()));
    }
    Ok(())
}
