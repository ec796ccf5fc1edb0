/// Table names of one content graph, all sharing a per-repository prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    prefix: String,
}

impl TableNames {
    /// Tables for the given content repository, e.g. `cr_default_p_graph_node`.
    pub fn for_content_repository(content_repository_id: &str) -> Self {
        Self {
            prefix: format!("cr_{content_repository_id}_p_graph"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn node(&self) -> String {
        format!("{}_node", self.prefix)
    }

    pub fn hierarchy_relation(&self) -> String {
        format!("{}_hierarchyrelation", self.prefix)
    }

    pub fn reference_relation(&self) -> String {
        format!("{}_referencerelation", self.prefix)
    }

    pub fn restriction_relation(&self) -> String {
        format!("{}_restrictionrelation", self.prefix)
    }

    pub fn dimension_space_points(&self) -> String {
        format!("{}_dimensionspacepoints", self.prefix)
    }

    pub fn content_stream(&self) -> String {
        format!("{}_contentstream", self.prefix)
    }

    pub fn workspace(&self) -> String {
        format!("{}_workspace", self.prefix)
    }

    pub fn checkpoint(&self) -> String {
        format!("{}_checkpoint", self.prefix)
    }

    /// Every table, in the order they are created.
    pub fn all(&self) -> Vec<String> {
        vec![
            self.node(),
            self.hierarchy_relation(),
            self.reference_relation(),
            self.restriction_relation(),
            self.dimension_space_points(),
            self.content_stream(),
            self.workspace(),
            self.checkpoint(),
        ]
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::for_content_repository("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_share_prefix() {
        let tables = TableNames::for_content_repository("blog");
        assert_eq!(tables.node(), "cr_blog_p_graph_node");
        assert_eq!(tables.hierarchy_relation(), "cr_blog_p_graph_hierarchyrelation");
        assert!(tables.all().iter().all(|t| t.starts_with("cr_blog_p_graph_")));
        assert_eq!(tables.all().len(), 8);
    }
}
