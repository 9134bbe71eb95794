use std::fmt::Write;

use super::plan::ScaffoldPlan;

fn quoted<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.map(|n| format!("\"{n}\"")).collect::<Vec<_>>().join(", ")
}

/// Rust source for the model module.
pub fn render(plan: &ScaffoldPlan) -> String {
    let naming = &plan.naming;
    let pk = plan.primary_key();
    let lookup = plan.validation_field();
    let mut out = String::new();

    let _ = writeln!(out, "//! {} model. Generated by `farme make:crud`.\n", naming.entity);
    out.push_str("use farme_core::model::{Cast, Model, ModelConfig};\n");
    out.push_str("use farme_core::{Database, Page, QueryExpression, Result, Row, Value};\n\n");

    let _ = writeln!(out, "pub const TABLE: &str = \"{}\";", naming.table);
    let _ = writeln!(out, "pub const PRIMARY_KEY: &str = \"{pk}\";\n");

    out.push_str("pub fn model() -> Model {\n");
    let _ = writeln!(out, "    let config = ModelConfig::new(\"{}\")", naming.entity);
    out.push_str("        .table(TABLE)\n        .primary_key(PRIMARY_KEY)\n");
    let _ = writeln!(out, "        .timestamps({})", plan.has_timestamps());
    let _ = writeln!(out, "        .fillable([{}])", quoted(plan.fillable().map(|f| f.name())));
    for (column, cast) in plan.casts() {
        let _ = writeln!(out, "        .cast(\"{column}\", Cast::{cast:?})");
    }
    out.truncate(out.trim_end().len());
    out.push_str(";\n    Model::new(config)\n}\n");

    let _ = write!(
        out,
        r#"
pub fn find(db: &mut Database, id: impl Into<Value>) -> Result<Option<Row>> {{
    model().find(db, id)
}}

pub fn all(db: &mut Database) -> Result<Vec<Row>> {{
    model().all(db)
}}

pub fn paginate(db: &mut Database, page: u64, per_page: u64) -> Result<Page> {{
    model().paginate(db, page, per_page, &Row::new())
}}

pub fn create(db: &mut Database, data: Row) -> Result<Option<Row>> {{
    model().create(db, data)
}}

pub fn update(db: &mut Database, id: impl Into<Value>, data: Row) -> Result<Option<Row>> {{
    model().update(db, id, data)
}}

pub fn delete(db: &mut Database, id: impl Into<Value>) -> Result<u64> {{
    model().delete(db, id)
}}

pub fn find_by_{lookup}(db: &mut Database, {lookup}: impl Into<Value>) -> Result<Option<Row>> {{
    model().find_by(db, "{lookup}", {lookup})
}}

pub fn count(db: &mut Database) -> Result<u64> {{
    model().count(db, &Row::new())
}}

pub fn query() -> QueryExpression {{
    model().query()
}}

pub fn raw(db: &mut Database, sql: &str, params: &[Value]) -> Result<Vec<Row>> {{
    model().raw(db, sql, params)
}}
"#
    );
    out
}
