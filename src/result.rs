use serde::{Deserialize, Serialize};

use crate::parse::{BindingRow, Page};
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Head {
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    pub bindings: Vec<BindingRow>,
}

/// All pages of a run merged into one SPARQL 1.1 JSON results document:
/// `{"head": {"vars": [...]}, "results": {"bindings": [...]}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub head: Head,
    pub results: Bindings,
}

impl AggregateResult {
    /// Appends a page's rows and merges its header, keeping first-seen var order.
    pub fn merge(&mut self, page: Page) {
        for var in page.vars {
            if !self.head.vars.contains(&var) {
                self.head.vars.push(var);
            }
        }
        self.results.bindings.extend(page.bindings);
    }

    pub fn vars(&self) -> &[String] {
        &self.head.vars
    }

    pub fn bindings(&self) -> &[BindingRow] {
        &self.results.bindings
    }

    pub fn row_count(&self) -> usize {
        self.results.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.bindings.is_empty()
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}
