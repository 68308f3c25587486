use crate::{Error, Result};

pub const OFFSET_PLACEHOLDER: &str = "%(offset)s";
pub const LIMIT_PLACEHOLDER: &str = "%(limit)s";

/// A SPARQL query with `%(offset)s` and `%(limit)s` substitution sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    text: String,
}

impl QueryTemplate {
    /// Fails with `InvalidRequest` when either placeholder is missing, since
    /// such a template would return the same slice for every page.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        for placeholder in [OFFSET_PLACEHOLDER, LIMIT_PLACEHOLDER] {
            if !text.contains(placeholder) {
                return Err(Error::InvalidRequest(format!(
                    "query template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self { text })
    }

    /// Substitutes every occurrence of both placeholders.
    pub fn instantiate(&self, offset: u64, limit: u64) -> String {
        self.text
            .replace(OFFSET_PLACEHOLDER, &offset.to_string())
            .replace(LIMIT_PLACEHOLDER, &limit.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_offset_and_limit() {
        let tpl = QueryTemplate::new("SELECT ?s WHERE { ?s ?p ?o }\nOFFSET %(offset)s  LIMIT %(limit)s").unwrap();
        assert_eq!(
            tpl.instantiate(20000, 10000),
            "SELECT ?s WHERE { ?s ?p ?o }\nOFFSET 20000  LIMIT 10000"
        );
    }

    #[test]
    fn substitutes_repeated_placeholders() {
        let tpl = QueryTemplate::new("# %(offset)s\nOFFSET %(offset)s LIMIT %(limit)s").unwrap();
        assert_eq!(tpl.instantiate(5, 2), "# 5\nOFFSET 5 LIMIT 2");
    }

    #[test]
    fn bundled_queries_are_valid_templates() {
        for text in [
            include_str!("../queries/WTOEntitiesUsed.rq"),
            include_str!("../queries/NCBITaxonEntitiesUsed.rq"),
            include_str!("../queries/GeneVarietyEntitiesUsed.rq"),
            include_str!("../queries/NCBIEntityTypes.rq"),
        ] {
            let query = QueryTemplate::new(text).unwrap().instantiate(20000, 10000);
            assert!(query.contains("20000"));
            assert!(!query.contains("%("));
        }
    }

    #[test]
    fn rejects_missing_placeholders() {
        assert!(matches!(
            QueryTemplate::new("SELECT ?s WHERE { ?s ?p ?o } LIMIT %(limit)s"),
            Err(Error::InvalidRequest(msg)) if msg.contains("%(offset)s")
        ));
        assert!(matches!(
            QueryTemplate::new("SELECT ?s WHERE { ?s ?p ?o } OFFSET %(offset)s"),
            Err(Error::InvalidRequest(msg)) if msg.contains("%(limit)s")
        ));
    }
}
