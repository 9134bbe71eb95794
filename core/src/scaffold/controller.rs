use std::fmt::Write;

use heck::ToTitleCase;

use super::classify::FieldKind;
use super::plan::{Field, ScaffoldPlan};

/// How one form field is read from the request into a row value.
fn extract(field: &Field) -> String {
    let name = field.name();
    let input = format!("req.input(\"{name}\")");
    match field.kind {
        FieldKind::Boolean => format!("{input}.map_or(false, |v| v == \"1\" || v == \"on\")"),
        FieldKind::Integer => format!("{input}.and_then(|v| v.trim().parse::<i64>().ok())"),
        FieldKind::Float => format!("{input}.and_then(|v| v.trim().parse::<f64>().ok())"),
        FieldKind::Json => format!("{input}.and_then(|v| serde_json::from_str::<serde_json::Value>(&v).ok())"),
        FieldKind::Date | FieldKind::DateTime => format!("{input}.filter(|v| !v.is_empty()).map(|v| v.replace('T', \" \"))"),
        _ => input,
    }
}

/// Reads the `{id}` route segment as a primary key value. Integer keys must parse, so a
/// malformed id is a miss rather than a text comparison against an integer column.
fn route_id(plan: &ScaffoldPlan) -> String {
    let parse = if plan.has_integer_key() {
        "req.param(\"id\").and_then(|v| v.trim().parse::<i64>().ok()).map(Value::Int)"
    } else {
        "req.param(\"id\").filter(|v| !v.is_empty()).map(Value::from)"
    };
    format!("fn route_id(req: &Request) -> Option<Value> {{\n    {parse}\n}}\n\n")
}

fn form_data(plan: &ScaffoldPlan) -> String {
    let mut out = String::from("fn form_data(req: &Request, updating: bool) -> Row {\n    let mut data = Row::new();\n");
    let mut uses_updating = false;
    for field in plan.fillable() {
        let name = field.name();
        if field.kind == FieldKind::Password {
            uses_updating = true;
            let _ = write!(
                out,
                "    match req.input(\"{name}\").filter(|v| !v.is_empty()) {{\n        \
                 Some(secret) => {{\n            \
                 data.insert(\"{name}\".to_string(), Value::from(hash_password(&secret)));\n        \
                 }}\n        \
                 None if !updating => {{\n            \
                 data.insert(\"{name}\".to_string(), Value::Null);\n        \
                 }}\n        \
                 None => {{}}\n    \
                 }}\n"
            );
        } else {
            let _ = writeln!(out, "    data.insert(\"{name}\".to_string(), Value::from({}));", extract(field));
        }
    }
    if !uses_updating {
        out.push_str("    let _ = updating;\n");
    }
    out.push_str("    data\n}\n");
    out
}

/// Rust source for the controller module.
pub fn render(plan: &ScaffoldPlan) -> String {
    let n = &plan.naming;
    let p = &n.plural;
    let route = &n.route;
    let view = &n.view_dir;
    let module = &n.module;
    let title = n.table.to_title_case();
    let entity = &n.entity;
    let required = plan.validation_field();
    let required_label = required.to_title_case();
    let guard = if plan.admin {
        "    require_auth(req)?;\n    require_admin(req)?;\n"
    } else {
        ""
    };
    let has_password = plan.fillable().any(|f| f.kind == FieldKind::Password);

    let mut out = String::new();
    let _ = writeln!(out, "//! {title} controller. Generated by `farme make:crud`.\n");
    out.push_str("use farme_core::{Row, Value};\nuse serde_json::json;\n\n");
    let _ = writeln!(
        out,
        "use crate::app::{{\n    csrf_token, flash_error, flash_success, not_found, redirect, render,{} require_admin, require_auth, verify_csrf,\n    Handler, Request, Response, Result,\n}};",
        if has_password { " hash_password," } else { "" }
    );
    let _ = writeln!(out, "use crate::models::{module};\n");

    let _ = write!(
        out,
        r#"pub fn routes() -> Vec<(&'static str, &'static str, Handler)> {{
    vec![
        ("GET", "{route}", {p}_index),
        ("GET", "{route}/create", {p}_create),
        ("POST", "{route}", {p}_store),
        ("GET", "{route}/{{id}}", {p}_show),
        ("GET", "{route}/{{id}}/edit", {p}_edit),
        ("POST", "{route}/{{id}}/update", {p}_update),
        ("POST", "{route}/{{id}}/delete", {p}_destroy),
    ]
}}

pub fn {p}_index(req: &mut Request) -> Result<Response> {{
{guard}    let page = req.input("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let items = {module}::paginate(req.db(), page, 15)?;
    render("{view}/index", json!({{
        "title": "{title}",
        "items": items,
        "csrf_token": csrf_token(req),
    }}))
}}

pub fn {p}_show(req: &mut Request) -> Result<Response> {{
{guard}    let Some(id) = route_id(req) else {{
        return not_found();
    }};
    let Some(item) = {module}::find(req.db(), id)? else {{
        return not_found();
    }};
    render("{view}/show", json!({{
        "title": "{entity} Details",
        "item": item,
        "csrf_token": csrf_token(req),
    }}))
}}

pub fn {p}_create(req: &mut Request) -> Result<Response> {{
{guard}    render("{view}/create", json!({{
        "title": "Create {entity}",
        "csrf_token": csrf_token(req),
    }}))
}}

pub fn {p}_store(req: &mut Request) -> Result<Response> {{
{guard}    verify_csrf(req)?;
    if req.input("{required}").map_or(true, |v| v.trim().is_empty()) {{
        flash_error(req, "{required_label} is required");
        return redirect("{route}/create");
    }}
    let data = form_data(req, false);
    match {module}::create(req.db(), data) {{
        Ok(Some(_)) => {{
            flash_success(req, "{entity} created successfully");
            redirect("{route}")
        }}
        Ok(None) | Err(_) => {{
            flash_error(req, "Failed to create {entity}");
            redirect("{route}/create")
        }}
    }}
}}

pub fn {p}_edit(req: &mut Request) -> Result<Response> {{
{guard}    let Some(id) = route_id(req) else {{
        return not_found();
    }};
    let Some(item) = {module}::find(req.db(), id)? else {{
        return not_found();
    }};
    render("{view}/edit", json!({{
        "title": "Edit {entity}",
        "item": item,
        "csrf_token": csrf_token(req),
    }}))
}}

pub fn {p}_update(req: &mut Request) -> Result<Response> {{
{guard}    verify_csrf(req)?;
    let Some(id) = route_id(req) else {{
        return not_found();
    }};
    if req.input("{required}").map_or(true, |v| v.trim().is_empty()) {{
        flash_error(req, "{required_label} is required");
        return redirect(&format!("{route}/{{id}}/edit"));
    }}
    let data = form_data(req, true);
    match {module}::update(req.db(), id.clone(), data) {{
        Ok(Some(_)) => {{
            flash_success(req, "{entity} updated successfully");
            redirect(&format!("{route}/{{id}}"))
        }}
        Ok(None) | Err(_) => {{
            flash_error(req, "Failed to update {entity}");
            redirect(&format!("{route}/{{id}}/edit"))
        }}
    }}
}}

pub fn {p}_destroy(req: &mut Request) -> Result<Response> {{
{guard}    verify_csrf(req)?;
    let Some(id) = route_id(req) else {{
        return not_found();
    }};
    match {module}::delete(req.db(), id) {{
        Ok(n) if n > 0 => flash_success(req, "{entity} deleted successfully"),
        _ => flash_error(req, "Failed to delete {entity}"),
    }}
    redirect("{route}")
}}

"#
    );
    out.push_str(&route_id(plan));
    out.push_str(&form_data(plan));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::ColumnDescriptor;

    fn users(admin: bool) -> ScaffoldPlan {
        let columns = vec![
            ColumnDescriptor::new("id", "INTEGER").increments(),
            ColumnDescriptor::new("name", "VARCHAR(100)").not_null(),
            ColumnDescriptor::new("password", "VARCHAR(255)"),
            ColumnDescriptor::new("age", "INTEGER"),
            ColumnDescriptor::new("active", "BOOLEAN"),
        ];
        ScaffoldPlan::new("User", columns, admin)
    }

    #[test]
    fn test_seven_handlers_and_routes() {
        let source = render(&users(false));
        for action in ["index", "show", "create", "store", "edit", "update", "destroy"] {
            assert!(source.contains(&format!("pub fn users_{action}(req: &mut Request) -> Result<Response>")));
        }
        assert!(source.contains("(\"GET\", \"/users/{id}/edit\", users_edit),"));
        assert!(source.contains("render(\"users/index\", json!({"));
        assert!(!source.contains("require_auth"));
    }

    #[test]
    fn test_admin_guard() {
        let source = render(&users(true));
        assert_eq!(source.matches("    require_auth(req)?;\n    require_admin(req)?;\n").count(), 7);
        assert!(source.contains("pub fn admin_users_index("));
        assert!(source.contains("(\"POST\", \"/admin-users\", admin_users_store),"));
        assert!(source.contains("render(\"admin/users/edit\""));
    }

    #[test]
    fn test_validation_and_extraction() {
        let source = render(&users(false));
        assert!(source.contains("if req.input(\"name\").map_or(true, |v| v.trim().is_empty()) {"));
        assert!(source.contains("flash_error(req, \"Name is required\");"));
        assert!(source.contains("data.insert(\"age\".to_string(), Value::from(req.input(\"age\").and_then(|v| v.trim().parse::<i64>().ok())));"));
        assert!(source.contains("data.insert(\"active\".to_string(), Value::from(req.input(\"active\").map_or(false, |v| v == \"1\" || v == \"on\")));"));
        assert!(source.contains("None if !updating => {"));
        assert!(source.contains(" hash_password,"));
    }

    #[test]
    fn test_route_id_matches_key_type() {
        let source = render(&users(false));
        assert!(source.contains(
            "fn route_id(req: &Request) -> Option<Value> {\n    req.param(\"id\").and_then(|v| v.trim().parse::<i64>().ok()).map(Value::Int)\n}"
        ));
        assert_eq!(source.matches("let Some(id) = route_id(req) else {").count(), 4);
        assert!(!source.contains("Value::from(req.param(\"id\"))"));
        assert!(source.contains("match user::update(req.db(), id.clone(), data) {"));

        let columns = vec![
            ColumnDescriptor::new("code", "VARCHAR(8)").primary_key(),
            ColumnDescriptor::new("label", "VARCHAR(100)").not_null(),
        ];
        let source = render(&ScaffoldPlan::new("Country", columns, false));
        assert!(source.contains("req.param(\"id\").filter(|v| !v.is_empty()).map(Value::from)"));
    }
}
