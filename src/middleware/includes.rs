use serde_json::{Map, Value};

use crate::model::{IncludeDescriptor, IncludeTable};

/// Picks the relations to eager-load from `params.includes`.
///
/// `includes` must be a comma-separated string; any other shape (absent,
/// array, number) means no includes. Names missing from `table` are dropped.
/// Matches keep the order, and any repeats, of the request.
///
/// Returns `None` rather than an empty list so callers can omit the include
/// clause altogether. Matched descriptors are cloned out of the table; the
/// caller may mutate them freely.
pub fn resolve_includes(
    params: &Map<String, Value>,
    table: Option<&IncludeTable>,
) -> Option<Vec<IncludeDescriptor>> {
    let table = table?;
    let requested = params.get("includes")?.as_str()?;

    let selected: Vec<IncludeDescriptor> = requested
        .split(',')
        .filter_map(|name| table.get(name))
        .cloned()
        .collect();

    (!selected.is_empty()).then_some(selected)
}
