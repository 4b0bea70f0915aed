//! Recursive CTE generation for variable-length relationship segments.
//!
//! The CTE produces `(start_id, end_id, depth, path)` reachability rows
//! over the edge table. `path` accumulates visited node ids so a node
//! appears at most once on a path, which bounds the recursion together
//! with the depth guard.

pub struct VariableLengthCte {
    pub name: String,
    pub schema: String,
    /// Conjuncts over the edge alias `e` (labels, properties).
    pub edge_conjuncts: Vec<String>,
    pub max_depth: u32,
    pub undirected: bool,
}

impl VariableLengthCte {
    pub fn render(&self) -> String {
        let edges = format!("{}.edges", self.schema);
        let filter = if self.edge_conjuncts.is_empty() {
            String::new()
        } else {
            format!("\n    WHERE {}", self.edge_conjuncts.join(" AND "))
        };
        let recursive_filter = if self.edge_conjuncts.is_empty() {
            String::new()
        } else {
            format!(" AND {}", self.edge_conjuncts.join(" AND "))
        };

        let mut sql = String::new();
        if self.undirected {
            // Both orientations seed the walk, and each step may traverse an
            // edge in either direction.
            sql.push_str(&format!(
                "    SELECT e.source AS start_id, e.target AS end_id, 1 AS depth, \
                 ARRAY[e.source, e.target] AS path\n    FROM {edges} AS e{filter}\n",
            ));
            sql.push_str("    UNION ALL\n");
            sql.push_str(&format!(
                "    SELECT e.target AS start_id, e.source AS end_id, 1 AS depth, \
                 ARRAY[e.target, e.source] AS path\n    FROM {edges} AS e{filter}\n",
            ));
            sql.push_str("    UNION ALL\n");
            sql.push_str(&format!(
                "    SELECT p.start_id, \
                 CASE WHEN e.source = p.end_id THEN e.target ELSE e.source END AS end_id, \
                 p.depth + 1 AS depth, \
                 p.path || CASE WHEN e.source = p.end_id THEN e.target ELSE e.source END AS path\n    \
                 FROM {name} AS p\n    \
                 JOIN {edges} AS e ON e.source = p.end_id OR e.target = p.end_id\n    \
                 WHERE p.depth < {max}{recursive_filter} \
                 AND NOT (CASE WHEN e.source = p.end_id THEN e.target ELSE e.source END) = ANY(p.path)",
                name = self.name,
                max = self.max_depth,
            ));
        } else {
            sql.push_str(&format!(
                "    SELECT e.source AS start_id, e.target AS end_id, 1 AS depth, \
                 ARRAY[e.source, e.target] AS path\n    FROM {edges} AS e{filter}\n",
            ));
            sql.push_str("    UNION ALL\n");
            sql.push_str(&format!(
                "    SELECT p.start_id, e.target AS end_id, p.depth + 1 AS depth, \
                 p.path || e.target AS path\n    \
                 FROM {name} AS p\n    \
                 JOIN {edges} AS e ON e.source = p.end_id\n    \
                 WHERE p.depth < {max}{recursive_filter} AND NOT e.target = ANY(p.path)",
                name = self.name,
                max = self.max_depth,
            ));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directed_body_has_depth_guard_and_cycle_check() {
        let cte = VariableLengthCte {
            name: "path_0".into(),
            schema: "pgraf".into(),
            edge_conjuncts: vec!["'FOLLOWS' = ANY(e.labels)".into()],
            max_depth: 3,
            undirected: false,
        };
        let sql = cte.render();
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains("p.depth < 3"));
        assert!(sql.contains("NOT e.target = ANY(p.path)"));
        assert!(sql.contains("'FOLLOWS' = ANY(e.labels)"));
        assert!(sql.contains("1 AS depth"));
    }

    #[test]
    fn undirected_body_walks_both_orientations() {
        let cte = VariableLengthCte {
            name: "path_1".into(),
            schema: "pgraf".into(),
            edge_conjuncts: vec![],
            max_depth: 10,
            undirected: true,
        };
        let sql = cte.render();
        assert!(sql.contains("e.target AS start_id, e.source AS end_id"));
        assert!(sql.contains("e.source = p.end_id OR e.target = p.end_id"));
        assert!(sql.contains("p.depth < 10"));
    }
}
