use serde_json::{Map, Value};

use crate::error::PageError;

/// One result row: variable name -> `{type, value, ...}` term, exactly as the endpoint encoded it.
pub type BindingRow = Map<String, Value>;

/// One page of SPARQL JSON results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub vars: Vec<String>,
    pub bindings: Vec<BindingRow>,
}

impl Page {
    pub fn row_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Attempts to decode a response body as a page of SPARQL JSON results.
///
/// A body that is not JSON at all yields `MalformedResponse` (often a truncated
/// body or an HTML error page from a proxy). JSON without `head.vars` and
/// `results.bindings` yields `InvalidShape`.
pub(crate) fn parse_page(body: &str) -> Result<Page, PageError> {
    let doc: Value =
        serde_json::from_str(body).map_err(|e| PageError::MalformedResponse(e.to_string()))?;
    page_from_value(doc)
}

pub(crate) fn page_from_value(doc: Value) -> Result<Page, PageError> {
    let Value::Object(mut doc) = doc else {
        return Err(PageError::InvalidShape("top level is not an object".into()));
    };

    let vars = match doc.get("head").and_then(|h| h.get("vars")) {
        Some(Value::Array(vars)) => vars
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| PageError::InvalidShape(format!("non-string var: {v}")))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(PageError::InvalidShape("head.vars is not an array".into())),
        None => return Err(PageError::InvalidShape("missing head.vars".into())),
    };

    let bindings = match doc
        .get_mut("results")
        .and_then(|r| r.get_mut("bindings"))
        .map(Value::take)
    {
        Some(Value::Array(rows)) => rows
            .into_iter()
            .map(|row| match row {
                Value::Object(row) => Ok(row),
                other => Err(PageError::InvalidShape(format!("binding row is not an object: {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(PageError::InvalidShape(
                "results.bindings is not an array".into(),
            ))
        }
        None => return Err(PageError::InvalidShape("missing results.bindings".into())),
    };

    Ok(Page { vars, bindings })
}
