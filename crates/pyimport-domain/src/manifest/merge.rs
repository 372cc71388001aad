use toml_edit::{Array, ArrayOfTables, Item, Table, TableLike, Value};

/// How arrays that exist on both sides of a merge are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayMerge {
    /// The incoming array replaces the existing one.
    Replace,
    /// Incoming entries not already present are appended.
    Extend,
}

/// Recursively merge `source` into `target`.
///
/// Missing keys are inserted, tables present on both sides are merged key by
/// key, and any other collision is resolved in favor of `source` (arrays
/// follow `arrays`). Values that are replaced keep the surrounding
/// whitespace and trailing comments of the value they overwrite.
pub fn merge_tables(target: &mut dyn TableLike, source: Table, arrays: ArrayMerge) {
    merge_into(target, source, arrays, false);
}

fn merge_into(target: &mut dyn TableLike, source: Table, arrays: ArrayMerge, inline: bool) {
    for (key, incoming) in source {
        let key = key.as_str();
        let Some(existing) = target.get_mut(key) else {
            target.insert(key, detach(incoming, inline));
            continue;
        };

        if existing.is_table_like() && incoming.is_table_like() {
            let nested_inline = inline || existing.is_inline_table();
            if let (Some(nested), Some(incoming)) =
                (existing.as_table_like_mut(), into_table(incoming))
            {
                merge_into(nested, incoming, arrays, nested_inline);
            }
            continue;
        }

        if arrays == ArrayMerge::Extend {
            if let (Some(current), Some(incoming)) = (existing.as_array_mut(), incoming.as_array())
            {
                extend_array(current, incoming);
                continue;
            }
        }

        replace_item(existing, detach(incoming, inline));
    }
}

/// Strip document positions from tables parsed elsewhere, and fold them into
/// values when they land inside an inline table.
fn detach(item: Item, inline: bool) -> Item {
    match item {
        Item::Table(table) if inline => Item::Value(Value::InlineTable(table.into_inline_table())),
        Item::Table(table) => Item::Table(fresh_table(table)),
        Item::ArrayOfTables(array) if inline => Item::Value(Value::Array(array.into_array())),
        Item::ArrayOfTables(array) => {
            let mut fresh = ArrayOfTables::new();
            for table in array {
                fresh.push(fresh_table(table));
            }
            Item::ArrayOfTables(fresh)
        }
        other => other,
    }
}

fn fresh_table(table: Table) -> Table {
    let mut fresh = Table::new();
    fresh.set_implicit(table.is_implicit());
    *fresh.decor_mut() = table.decor().clone();
    for (key, item) in table {
        fresh.insert(&key, detach(item, false));
    }
    fresh
}

fn into_table(item: Item) -> Option<Table> {
    match item {
        Item::Table(table) => Some(table),
        Item::Value(Value::InlineTable(inline)) => Some(inline.into_table()),
        _ => None,
    }
}

fn extend_array(current: &mut Array, incoming: &Array) {
    let line_prefix = entry_line_prefix(current);
    for candidate in incoming {
        if current.iter().any(|value| same_value(value, candidate)) {
            continue;
        }
        let mut candidate = candidate.clone();
        candidate.decor_mut().clear();
        match &line_prefix {
            Some(prefix) => {
                candidate.decor_mut().set_prefix(prefix.as_str());
                current.push_formatted(candidate);
            }
            None => current.push(candidate),
        }
    }
}

/// Prefix for entries appended to an array laid out one entry per line: a
/// line break plus the indentation of the last entry. `None` for single-line
/// arrays.
fn entry_line_prefix(array: &Array) -> Option<String> {
    let prefix = array.iter().last()?.decor().prefix()?.as_str()?;
    let line_start = prefix.rfind('\n')?;
    Some(format!("\n{}", &prefix[line_start + 1..]))
}

/// Lay an array out one entry per line with a trailing comma.
pub(crate) fn format_multiline(array: &mut Array) {
    for entry in array.iter_mut() {
        entry.decor_mut().set_prefix("\n    ");
        entry.decor_mut().set_suffix("");
    }
    array.set_trailing_comma(true);
    array.set_trailing("\n");
}

fn same_value(left: &Value, right: &Value) -> bool {
    match (left.as_str(), right.as_str()) {
        (Some(left), Some(right)) => left == right,
        _ => bare(left) == bare(right),
    }
}

fn bare(value: &Value) -> String {
    let mut value = value.clone();
    value.decor_mut().clear();
    value.to_string()
}

fn replace_item(existing: &mut Item, incoming: Item) {
    match (existing, incoming) {
        (Item::Value(current), Item::Value(mut replacement)) => {
            *replacement.decor_mut() = current.decor().clone();
            *current = replacement;
        }
        (existing, incoming) => *existing = incoming,
    }
}
