//! Post-extraction relation synthesis.
//!
//! Two steps every language parser runs before returning: CONTAINS edges
//! from the file entity to each code entity, and CALLS edges filtered
//! against the known-names universe. The filter is the sole source of CALLS
//! edges from chunk metadata and keeps phantom callees out of the graph.

use std::collections::HashSet;

use strata_core::types::{ChunkType, Entity, EntityChunk, EntityType, Relation};

/// CONTAINS(file, entity) for every function/class/interface/variable/import
/// entity, in entity order.
pub fn containment_relations(file_name: &str, entities: &[Entity]) -> Vec<Relation> {
    entities
        .iter()
        .filter(|e| {
            matches!(
                e.entity_type,
                EntityType::Function
                    | EntityType::Class
                    | EntityType::Interface
                    | EntityType::Variable
                    | EntityType::Import
            )
        })
        .map(|e| Relation::contains(file_name, &e.name))
        .collect()
}

/// CALLS(chunk.entity, callee) for every callee in an implementation chunk's
/// semantic metadata that is a known name and not a self-call.
///
/// Known names = this file's entity names ∪ globally supplied names.
pub fn calls_relations(
    chunks: &[EntityChunk],
    entities: &[Entity],
    global_entity_names: Option<&HashSet<String>>,
    file_display_name: &str,
) -> Vec<Relation> {
    let mut known: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
    if let Some(global) = global_entity_names {
        known.extend(global.iter().map(String::as_str));
    }

    let mut relations = Vec::new();
    for chunk in chunks {
        if chunk.chunk_type != ChunkType::Implementation {
            continue;
        }
        let Some(semantic) = &chunk.metadata.semantic_metadata else {
            continue;
        };
        for callee in &semantic.calls {
            if callee != &chunk.entity_name && known.contains(callee.as_str()) {
                relations.push(Relation::calls(
                    &chunk.entity_name,
                    callee,
                    format!("Function call in {file_display_name}"),
                ));
            }
        }
    }
    relations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use strata_core::types::{ChunkMetadata, SemanticMetadata};

    fn chunk(entity: &str, calls: &[&str]) -> EntityChunk {
        EntityChunk {
            id: format!("id::{entity}"),
            entity_name: entity.to_string(),
            chunk_type: ChunkType::Implementation,
            content: String::new(),
            metadata: ChunkMetadata::new("function", Path::new("/p/a.py"), 1, 5).with_semantic(
                SemanticMetadata {
                    calls: calls.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                },
            ),
        }
    }

    fn entity(name: &str, ty: EntityType) -> Entity {
        match ty {
            EntityType::Function => {
                Entity::function(name, Path::new("/p/a.py"), 1, 5, vec![])
            }
            EntityType::Variable => {
                Entity::variable(name, Path::new("/p/a.py"), 1, 1, vec![])
            }
            EntityType::Documentation => {
                Entity::documentation(name, Path::new("/p/a.py"), 1, vec![])
            }
            _ => Entity::class(name, Path::new("/p/a.py"), 1, 5, vec![]),
        }
    }

    #[test]
    fn test_containment_covers_code_entities_only() {
        let entities = vec![
            Entity::file(Path::new("/p/a.py"), 2, "code", true),
            entity("run", EntityType::Function),
            entity("MAX", EntityType::Variable),
            entity("Header", EntityType::Documentation),
        ];
        let relations = containment_relations("/p/a.py", &entities);
        assert_eq!(relations.len(), 2);
        assert!(relations
            .iter()
            .all(|r| r.from_entity == "/p/a.py" && r.relation_type.as_str() == "contains"));
        let targets: Vec<&str> = relations.iter().map(|r| r.to_entity.as_str()).collect();
        assert_eq!(targets, vec!["run", "MAX"]);
    }

    #[test]
    fn test_unknown_callees_produce_no_relations() {
        let entities = vec![entity("a", EntityType::Function)];
        let chunks = vec![chunk("a", &["b", "c"])];
        let relations = calls_relations(&chunks, &entities, None, "a.py");
        assert!(relations.is_empty());
    }

    #[test]
    fn test_known_callee_produces_one_relation() {
        let entities = vec![entity("a", EntityType::Function)];
        let chunks = vec![chunk("a", &["b", "c"])];
        let global: HashSet<String> = ["a".to_string(), "b".to_string()].into();
        let relations = calls_relations(&chunks, &entities, Some(&global), "a.py");
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].from_entity, "a");
        assert_eq!(relations[0].to_entity, "b");
        assert_eq!(relations[0].context.as_deref(), Some("Function call in a.py"));
    }

    #[test]
    fn test_self_calls_suppressed() {
        let entities = vec![entity("recurse", EntityType::Function)];
        let chunks = vec![chunk("recurse", &["recurse"])];
        let relations = calls_relations(&chunks, &entities, None, "a.py");
        assert!(relations.is_empty());
    }

    #[test]
    fn test_metadata_chunks_ignored() {
        let entities = vec![entity("a", EntityType::Function), entity("b", EntityType::Function)];
        let mut c = chunk("a", &["b"]);
        c.chunk_type = ChunkType::Metadata;
        assert!(calls_relations(&[c], &entities, None, "a.py").is_empty());
    }
}
