use neo4rs::query;
use tracing::{debug, warn};

use crate::{GraphClient, GraphReadError, GraphSchema, PropertyInfo, QueryRow};

/// Read-side access: schema introspection and capped query execution.
#[derive(Clone)]
pub struct GraphReader {
    client: GraphClient,
}

impl GraphReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Introspect the live schema. Labels and relationship types come from
    /// the built-in `db.schema.*` procedures; patterns from the data itself.
    pub async fn schema(&self) -> Result<GraphSchema, GraphReadError> {
        let err = |e: neo4rs::Error| GraphReadError::Schema(e.to_string());
        let g = &self.client.graph;
        let mut schema = GraphSchema::default();

        let mut stream = g
            .execute(query(
                "CALL db.schema.nodeTypeProperties()
                 YIELD nodeLabels, propertyName, propertyTypes
                 RETURN nodeLabels AS labels,
                        coalesce(propertyName, '') AS property,
                        coalesce(propertyTypes, []) AS types",
            ))
            .await
            .map_err(err)?;
        while let Some(row) = stream.next().await.map_err(err)? {
            let labels: Vec<String> = row.get("labels").unwrap_or_default();
            let property: String = row.get("property").unwrap_or_default();
            let types: Vec<String> = row.get("types").unwrap_or_default();
            let info = property_info(property, &types);
            for label in &labels {
                schema.add_node_property(label, info.clone());
            }
        }

        let mut stream = g
            .execute(query(
                "CALL db.schema.relTypeProperties()
                 YIELD relType, propertyName, propertyTypes
                 RETURN relType AS rel,
                        coalesce(propertyName, '') AS property,
                        coalesce(propertyTypes, []) AS types",
            ))
            .await
            .map_err(err)?;
        while let Some(row) = stream.next().await.map_err(err)? {
            let rel: String = row.get("rel").unwrap_or_default();
            let property: String = row.get("property").unwrap_or_default();
            let types: Vec<String> = row.get("types").unwrap_or_default();
            schema.add_relationship_property(&clean_rel_type(&rel), property_info(property, &types));
        }

        let mut stream = g
            .execute(query(
                "MATCH (a)-[r]->(b)
                 WITH DISTINCT labels(a) AS from_labels, type(r) AS rel, labels(b) AS to_labels
                 UNWIND from_labels AS from_label
                 UNWIND to_labels AS to_label
                 RETURN DISTINCT from_label, rel, to_label",
            ))
            .await
            .map_err(err)?;
        while let Some(row) = stream.next().await.map_err(err)? {
            let from: String = row.get("from_label").unwrap_or_default();
            let rel: String = row.get("rel").unwrap_or_default();
            let to: String = row.get("to_label").unwrap_or_default();
            schema.add_pattern(&from, &rel, &to);
        }

        debug!(
            labels = schema.nodes.len(),
            patterns = schema.patterns.len(),
            "Schema introspected"
        );
        Ok(schema)
    }

    /// Execute a statement inside a transaction that is always rolled back,
    /// so nothing it does can persist. Keeps at most `row_cap` rows.
    pub async fn read_query(
        &self,
        cypher: &str,
        row_cap: usize,
    ) -> Result<Vec<QueryRow>, GraphReadError> {
        let err = |e: neo4rs::Error| GraphReadError::Query(e.to_string());

        let mut txn = self.client.graph.start_txn().await.map_err(err)?;
        let result = async {
            let mut stream = txn.execute(query(cypher)).await.map_err(err)?;
            let mut rows = Vec::new();
            while rows.len() < row_cap {
                match stream.next(txn.handle()).await.map_err(err)? {
                    Some(row) => rows.push(
                        row.to::<QueryRow>()
                            .map_err(|e| GraphReadError::Decode(e.to_string()))?,
                    ),
                    None => break,
                }
            }
            Ok(rows)
        }
        .await;

        if let Err(e) = txn.rollback().await {
            warn!(error = %e, "Rollback of read transaction failed");
        }
        result
    }
}

fn property_info(name: String, types: &[String]) -> Option<PropertyInfo> {
    if name.is_empty() {
        return None;
    }
    let kind = types.first().map(String::as_str).unwrap_or("ANY");
    Some(PropertyInfo::new(name, kind))
}

/// `db.schema.relTypeProperties` reports types as ":`PUBLISHED`".
fn clean_rel_type(raw: &str) -> String {
    raw.trim_start_matches(':').trim_matches('`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_type_is_unquoted() {
        assert_eq!(clean_rel_type(":`PUBLISHED`"), "PUBLISHED");
        assert_eq!(clean_rel_type("FOR"), "FOR");
    }

    #[test]
    fn nameless_property_is_dropped() {
        assert_eq!(property_info(String::new(), &["String".into()]), None);
        assert_eq!(
            property_info("name".into(), &[]),
            Some(PropertyInfo::new("name", "ANY"))
        );
    }
}
