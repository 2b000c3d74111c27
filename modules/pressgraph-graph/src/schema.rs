use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PropertyInfo {
    pub name: String,
    /// Upper-cased type name as reported by the server (STRING, DATETIME, ...).
    pub kind: String,
}

impl PropertyInfo {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into().to_ascii_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RelationshipPattern {
    pub from: String,
    pub rel: String,
    pub to: String,
}

/// Labels, relationship types and their properties, as handed to the
/// query generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSchema {
    pub nodes: BTreeMap<String, Vec<PropertyInfo>>,
    pub relationships: BTreeMap<String, Vec<PropertyInfo>>,
    pub patterns: Vec<RelationshipPattern>,
}

impl GraphSchema {
    pub fn add_node_property(&mut self, label: &str, property: Option<PropertyInfo>) {
        let props = self.nodes.entry(label.to_string()).or_default();
        if let Some(p) = property {
            if !props.contains(&p) {
                props.push(p);
                props.sort();
            }
        }
    }

    pub fn add_relationship_property(&mut self, rel: &str, property: Option<PropertyInfo>) {
        let props = self.relationships.entry(rel.to_string()).or_default();
        if let Some(p) = property {
            if !props.contains(&p) {
                props.push(p);
                props.sort();
            }
        }
    }

    pub fn add_pattern(&mut self, from: &str, rel: &str, to: &str) {
        let pattern = RelationshipPattern {
            from: from.to_string(),
            rel: rel.to_string(),
            to: to.to_string(),
        };
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
            self.patterns.sort();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.patterns.is_empty()
    }
}

fn write_props(f: &mut fmt::Formatter<'_>, props: &[PropertyInfo]) -> fmt::Result {
    let rendered: Vec<String> = props
        .iter()
        .map(|p| format!("{}: {}", p.name, p.kind))
        .collect();
    write!(f, "{{{}}}", rendered.join(", "))
}

impl fmt::Display for GraphSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node properties:")?;
        for (label, props) in &self.nodes {
            write!(f, "{label} ")?;
            write_props(f, props)?;
            writeln!(f)?;
        }
        writeln!(f, "Relationship properties:")?;
        for (rel, props) in self.relationships.iter().filter(|(_, p)| !p.is_empty()) {
            write!(f, "{rel} ")?;
            write_props(f, props)?;
            writeln!(f)?;
        }
        writeln!(f, "The relationships:")?;
        for p in &self.patterns {
            writeln!(f, "(:{})-[:{}]->(:{})", p.from, p.rel, p.to)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nodes_relationships_and_patterns() {
        let mut schema = GraphSchema::default();
        schema.add_node_property("Product", Some(PropertyInfo::new("name", "String")));
        schema.add_node_property("Content", Some(PropertyInfo::new("title", "String")));
        schema.add_node_property("Content", Some(PropertyInfo::new("ingested_at", "DateTime")));
        schema.add_relationship_property("HAS", None);
        schema.add_pattern("Content", "HAS", "Product");
        schema.add_pattern("Content", "HAS", "Product");

        let text = schema.to_string();
        assert_eq!(
            text,
            "Node properties:\n\
             Content {ingested_at: DATETIME, title: STRING}\n\
             Product {name: STRING}\n\
             Relationship properties:\n\
             The relationships:\n\
             (:Content)-[:HAS]->(:Product)\n"
        );
    }

    #[test]
    fn empty_schema_is_empty() {
        let mut schema = GraphSchema::default();
        assert!(schema.is_empty());
        schema.add_node_property("WebSource", None);
        assert!(!schema.is_empty());
    }
}
