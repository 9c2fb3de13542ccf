//! Search criteria carried by a command, plus the reserved tokens of the search protocol.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Presence anywhere in `where` switches the engine into pipeline mode.
pub const AGGREGATE_MARKER: &str = "aggregate";
/// Separates multiple pipeline commands packed into one `where`.
pub const PIPELINE_DELIMITER: &str = "~~";
/// Array field expected in a raw pipeline reply.
pub const PIPELINE_RESULT_FIELD: &str = "result";
/// `aggregateCriteria` value requesting a match count.
pub const AGGREGATE_COUNT: &str = "count";

const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(AppError::BadRequest(format!("invalid sort direction: {}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub property: String,
    pub direction: SortDirection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
    #[serde(default)]
    pub sort: Vec<SortKey>,
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> Self {
        PageRequest {
            page,
            size,
            sort: Vec::new(),
        }
    }

    pub fn with_sort(mut self, property: &str, direction: SortDirection) -> Self {
        self.sort.push(SortKey {
            property: property.to_string(),
            direction,
        });
        self
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCriteria {
    /// Output alias -> field path. Tuples follow the alias order.
    #[serde(default)]
    pub maps_to: BTreeMap<String, String>,
    /// Sub-array to unwrap from the first pipeline result document.
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, rename = "where")]
    pub where_: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub fetch: Option<String>,
    #[serde(default)]
    pub aggregate_criteria: Option<String>,
    #[serde(default)]
    pub project: Option<ProjectCriteria>,
    #[serde(default)]
    pub page: Option<PageRequest>,
}

fn non_blank(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from)
}

impl SearchCriteria {
    /// Build from command query parameters (`where`, `orderby`, `fetch`, `aggregateCriteria`,
    /// `projection.mapsTo`, `projection.alias`, `page`, `pageSize`, `sort`).
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let project = match (
            non_blank(params.get("projection.mapsTo")),
            non_blank(params.get("projection.alias")),
        ) {
            (None, None) => None,
            (maps_to, alias) => Some(ProjectCriteria {
                maps_to: maps_to.map(|m| parse_maps_to(&m)).transpose()?.unwrap_or_default(),
                alias,
            }),
        };

        let page_no = non_blank(params.get("page"));
        let page_size = non_blank(params.get("pageSize"));
        let page = if page_no.is_some() || page_size.is_some() {
            let page = parse_u64("page", page_no.as_deref())?.unwrap_or(0);
            let size = parse_u64("pageSize", page_size.as_deref())?.unwrap_or(DEFAULT_PAGE_SIZE);
            if size == 0 {
                return Err(AppError::BadRequest("pageSize must be positive".into()));
            }
            let mut req = PageRequest::new(page, size);
            if let Some(sort) = non_blank(params.get("sort")) {
                req.sort = parse_sort(&sort)?;
            }
            Some(req)
        } else {
            None
        };

        Ok(SearchCriteria {
            where_: non_blank(params.get("where")),
            order_by: non_blank(params.get("orderby")),
            fetch: non_blank(params.get("fetch")),
            aggregate_criteria: non_blank(params.get("aggregateCriteria")),
            project,
            page,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == SearchCriteria::default()
    }

    pub fn is_aggregation(&self) -> bool {
        self.where_
            .as_deref()
            .map(|w| w.contains(AGGREGATE_MARKER))
            .unwrap_or(false)
    }

    pub fn is_count(&self) -> bool {
        self.aggregate_criteria
            .as_deref()
            .map(|a| a.eq_ignore_ascii_case(AGGREGATE_COUNT))
            .unwrap_or(false)
    }

    pub fn is_fetch_one(&self) -> bool {
        self.fetch.as_deref().map(|f| !f.trim().is_empty()).unwrap_or(false)
    }

    /// Projected field paths, when a non-empty mapping is present.
    pub fn projection_fields(&self) -> Option<Vec<String>> {
        self.project
            .as_ref()
            .filter(|p| !p.maps_to.is_empty())
            .map(|p| p.maps_to.values().cloned().collect())
    }

    pub fn unwrap_alias(&self) -> Option<&str> {
        self.project
            .as_ref()
            .and_then(|p| p.alias.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

fn parse_u64(name: &str, v: Option<&str>) -> Result<Option<u64>, AppError> {
    v.map(|s| {
        s.parse::<u64>()
            .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", name)))
    })
    .transpose()
}

/// `alias:field,alias:field`
fn parse_maps_to(raw: &str) -> Result<BTreeMap<String, String>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (alias, field) = pair
                .split_once(':')
                .ok_or_else(|| AppError::BadRequest(format!("invalid projection mapping: {}", pair)))?;
            Ok((alias.trim().to_string(), field.trim().to_string()))
        })
        .collect()
}

/// `field,DIR;field,DIR` (direction defaults to ASC).
fn parse_sort(raw: &str) -> Result<Vec<SortKey>, AppError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (property, direction) = match entry.split_once(',') {
                Some((p, d)) => (p.trim(), d.parse()?),
                None => (entry, SortDirection::Asc),
            };
            if property.is_empty() {
                return Err(AppError::BadRequest(format!("invalid sort key: {}", entry)));
            }
            Ok(SortKey {
                property: property.to_string(),
                direction,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_params_give_empty_criteria() {
        assert!(SearchCriteria::from_params(&HashMap::new()).unwrap().is_empty());
        assert!(SearchCriteria::from_params(&params(&[("where", "  ")])).unwrap().is_empty());
    }

    #[test]
    fn parses_page_and_sort() {
        let c = SearchCriteria::from_params(&params(&[
            ("page", "2"),
            ("pageSize", "5"),
            ("sort", "attr,desc;name"),
        ]))
        .unwrap();
        let page = c.page.unwrap();
        assert_eq!(page.offset(), 10);
        assert_eq!(page.sort[0].direction, SortDirection::Desc);
        assert_eq!(page.sort[1].property, "name");
        assert_eq!(page.sort[1].direction, SortDirection::Asc);
    }

    #[test]
    fn parses_projection() {
        let c = SearchCriteria::from_params(&params(&[
            ("projection.mapsTo", "label:name, qty:size"),
            ("projection.alias", "items"),
        ]))
        .unwrap();
        assert_eq!(c.projection_fields().unwrap(), vec!["name", "size"]);
        assert_eq!(c.unwrap_alias(), Some("items"));
    }

    #[test]
    fn flags() {
        let c = SearchCriteria::from_params(&params(&[
            ("where", "{\"aggregate\": \"widgets\"}"),
            ("aggregateCriteria", "COUNT"),
            ("fetch", "1"),
        ]))
        .unwrap();
        assert!(c.is_aggregation());
        assert!(c.is_count());
        assert!(c.is_fetch_one());
    }

    #[test]
    fn rejects_zero_page_size() {
        assert!(SearchCriteria::from_params(&params(&[("pageSize", "0")])).is_err());
    }
}
