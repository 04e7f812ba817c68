//! Decoding of one index page.
//!
//! A single sheet looks like
//! `{"total": 7, "offset": 0, "limit": 3, "data": [..], ":type": "sheet"}`.
//! Workbooks with several sheets nest one such object per sheet name under
//! `":type": "multi-sheet"`, listing the names in `":names"`.

use crate::error::{Error, Result};
use crate::record::Record;
use serde::Deserialize;
use serde_json::Value;

/// A decoded page: the index's total record count and this page's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// Total records in the index (or selected sheet).
    pub total: u64,
    /// Offset the server reports for this page.
    pub offset: Option<u64>,
    /// Limit the server reports for this page.
    pub limit: Option<u64>,
    /// Rows of this page, in server order.
    pub records: Vec<Record>,
}

#[derive(Deserialize)]
struct SheetPage {
    total: u64,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    data: Vec<Value>,
}

const MULTI_SHEET: &str = "multi-sheet";

impl ResponseEnvelope {
    /// Decode a page body. `sheet` selects a sheet from a multi-sheet
    /// response; the first listed sheet is used when it is `None`.
    pub fn decode(body: &str, sheet: Option<&str>) -> Result<Self> {
        let root: Value = serde_json::from_str(body)?;
        let page = select_sheet(root, sheet)?;
        let page: SheetPage = serde_json::from_value(page)?;

        let records = page
            .data
            .into_iter()
            .map(Record::from_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            total: page.total,
            offset: page.offset,
            limit: page.limit,
            records,
        })
    }
}

fn select_sheet(root: Value, sheet: Option<&str>) -> Result<Value> {
    let Value::Object(mut map) = root else {
        return Err(Error::Decoding("index response is not a JSON object".into()));
    };

    let is_multi = map.get(":type").and_then(Value::as_str) == Some(MULTI_SHEET);
    if !is_multi {
        return Ok(Value::Object(map));
    }

    let name = match sheet {
        Some(name) => name.to_string(),
        None => map
            .get(":names")
            .and_then(Value::as_array)
            .and_then(|names| names.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Decoding("multi-sheet response lists no sheets".into()))?,
    };

    map.remove(&name)
        .ok_or_else(|| Error::Decoding(format!("sheet `{name}` not present in response")))
}
