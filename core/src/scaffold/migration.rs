use heck::ToTitleCase;

use super::plan::ScaffoldPlan;
use crate::inspect::ColumnDescriptor;
use crate::schema::{drop_table, ColumnDef, ColumnType, DefaultValue, TableBuilder};

/// The migration id stem, without timestamp.
pub fn name(plan: &ScaffoldPlan) -> String {
    format!("create_{}_table", plan.naming.table)
}

fn column_type(column: &ColumnDescriptor) -> ColumnType {
    let raw = column.raw_type.trim();
    let mut ty = if raw.is_empty() { "TEXT".to_string() } else { raw.to_string() };
    if !ty.contains('(') && ty.to_ascii_lowercase().contains("char") {
        if let Some(len) = column.max_length {
            ty = format!("{ty}({len})");
        }
    }
    if column.is_primary_key {
        ty.push_str(" PRIMARY KEY");
    }
    ColumnType::Raw(ty)
}

fn default_value(raw: &str) -> DefaultValue {
    let value = raw.trim();
    let upper = value.to_ascii_uppercase();
    if upper == "CURRENT_TIMESTAMP" || upper == "CURRENT_TIMESTAMP()" || upper == "NOW()" {
        DefaultValue::CurrentTimestamp
    } else if value.parse::<f64>().is_ok()
        || value.starts_with('\'')
        || value.contains('(')
        || value.contains("::")
        || matches!(upper.as_str(), "TRUE" | "FALSE" | "NULL")
    {
        DefaultValue::Expression(value.to_string())
    } else {
        DefaultValue::Literal(value.to_string())
    }
}

fn column_def(column: &ColumnDescriptor) -> ColumnDef {
    if column.is_primary_key && column.is_auto_increment {
        return ColumnDef::new(&column.name, ColumnType::Increments);
    }
    let mut def = ColumnDef::new(&column.name, column_type(column));
    if !column.nullable {
        def = def.not_null();
    }
    if let Some(default) = &column.default_value {
        def = def.default(default_value(default));
    }
    def
}

/// Up and down SQL creating the entity's table from the plan's columns.
pub fn render(plan: &ScaffoldPlan) -> (String, String) {
    let table = &plan.naming.table;
    let header = format!("-- Migration: {}\n\n", name(plan).to_title_case());
    let builder = plan
        .fields
        .iter()
        .fold(TableBuilder::create(table), |b, f| b.column(column_def(&f.column)));
    let up: String = builder.to_sql(&plan.driver).into_iter().map(|s| s + ";\n").collect();
    (format!("{header}{up}"), format!("{header}{};\n", drop_table(table)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;

    #[test]
    fn test_fallback_shape() {
        let (up, down) = render(&ScaffoldPlan::new("Widget", Vec::new(), false));
        assert_eq!(
            up,
            "-- Migration: Create Widgets Table\n\n\
             CREATE TABLE widgets (\n    \
             id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
             name VARCHAR(255) NOT NULL,\n    \
             email VARCHAR(255) NOT NULL,\n    \
             status BOOLEAN NOT NULL DEFAULT 1,\n    \
             created_at DATETIME DEFAULT CURRENT_TIMESTAMP,\n    \
             updated_at DATETIME DEFAULT CURRENT_TIMESTAMP\n);\n"
        );
        assert_eq!(down, "-- Migration: Create Widgets Table\n\nDROP TABLE IF EXISTS widgets;\n");
    }

    #[test]
    fn test_introspected_postgres_columns() {
        let columns = vec![
            ColumnDescriptor::new("id", "integer").increments(),
            ColumnDescriptor::new("title", "character varying").max_length(120).not_null(),
            ColumnDescriptor::new("state", "character varying").default_value("'draft'::character varying"),
            ColumnDescriptor::new("label", "varchar(20)").default_value("misc"),
        ];
        let plan = ScaffoldPlan::new("Post", columns, false).dialect(Driver::Postgres);
        let (up, _) = render(&plan);
        assert!(up.contains("id SERIAL PRIMARY KEY,\n"));
        assert!(up.contains("title character varying(120) NOT NULL,\n"));
        assert!(up.contains("state character varying DEFAULT 'draft'::character varying,\n"));
        assert!(up.contains("label varchar(20) DEFAULT 'misc'\n"));
    }

    #[test]
    fn test_composite_key_keeps_one_primary_key() {
        let columns = vec![
            ColumnDescriptor::new("post_id", "INTEGER").increments(),
            ColumnDescriptor::new("tag_id", "INTEGER").increments(),
            ColumnDescriptor::new("note", "TEXT"),
        ];
        let (up, _) = render(&ScaffoldPlan::new("PostTag", columns, false));
        assert!(up.contains("post_id INTEGER PRIMARY KEY AUTOINCREMENT,\n"));
        assert!(up.contains("tag_id INTEGER NOT NULL,\n"));
        assert_eq!(up.matches("PRIMARY KEY").count(), 1);
    }
}
