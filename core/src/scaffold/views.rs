//! Tera templates for the four CRUD pages.

use std::fmt::Write;

use super::classify::FieldKind;
use super::plan::{Field, ScaffoldPlan};

/// `{{ body }}`
fn expr(body: &str) -> String {
    format!("{{{{ {body} }}}}")
}

/// `{% body %}`
fn tag(body: &str) -> String {
    format!("{{% {body} %}}")
}

/// Guard `inner` so null values render as nothing instead of failing a filter.
fn when_set(var: &str, inner: String) -> String {
    format!("{}{inner}{}", tag(&format!("if {var}")), tag("endif"))
}

fn layout(plan: &ScaffoldPlan) -> &'static str {
    if plan.admin {
        "admin/layout.html.tera"
    } else {
        "layout.html.tera"
    }
}

fn open(plan: &ScaffoldPlan) -> String {
    format!(
        "{}\n{}\n<div class=\"container\">\n",
        tag(&format!("extends \"{}\"", layout(plan))),
        tag("block content")
    )
}

fn close() -> String {
    format!("</div>\n{}\n", tag("endblock"))
}

fn badge(var: &str) -> String {
    format!(
        "{}<span class=\"badge badge-success\">Yes</span>{}<span class=\"badge badge-secondary\">No</span>{}",
        tag(&format!("if {var}")),
        tag("else"),
        tag("endif")
    )
}

fn formatted_date(var: &str, kind: FieldKind) -> String {
    let format = if kind == FieldKind::Date { "%b %d, %Y" } else { "%b %d, %Y %H:%M" };
    when_set(var, expr(&format!("{var} | replace(from=\" \", to=\"T\") | date(format=\"{format}\")")))
}

/// One index table cell.
fn cell(field: &Field) -> String {
    let var = format!("item.{}", field.name());
    match field.kind {
        FieldKind::Boolean => badge(&var),
        kind if kind.is_temporal() => formatted_date(&var, kind),
        FieldKind::Email => when_set(&var, format!("<a href=\"mailto:{0}\">{0}</a>", expr(&var))),
        FieldKind::Password => "********".to_string(),
        FieldKind::Text | FieldKind::Url | FieldKind::Json => {
            when_set(&var, expr(&format!("{var} | truncate(length=50)")))
        }
        _ => expr(&var),
    }
}

pub fn index(plan: &ScaffoldPlan) -> String {
    let n = &plan.naming;
    let pk = plan.primary_key();
    let shown = plan.display_fields();
    let mut out = open(plan);
    let _ = write!(
        out,
        "    <div class=\"header\">\n        <h1>{}</h1>\n        <a href=\"{}/create\" class=\"btn btn-primary\">Create {}</a>\n    </div>\n\n",
        expr("title"),
        n.route,
        n.entity
    );
    let _ = writeln!(out, "    {}", tag("if items.data | length > 0"));
    out.push_str("    <table class=\"table\">\n        <thead>\n            <tr>\n");
    for field in &shown {
        let _ = writeln!(out, "                <th>{}</th>", field.label());
    }
    out.push_str("                <th>Actions</th>\n            </tr>\n        </thead>\n        <tbody>\n");
    let _ = writeln!(out, "            {}", tag("for item in items.data"));
    out.push_str("            <tr>\n");
    for field in &shown {
        let _ = writeln!(out, "                <td>{}</td>", cell(field));
    }
    let id = expr(&format!("item.{pk}"));
    let _ = write!(
        out,
        "                <td>\n                    \
         <a href=\"{route}/{id}\" class=\"btn btn-sm\">View</a>\n                    \
         <a href=\"{route}/{id}/edit\" class=\"btn btn-sm\">Edit</a>\n                    \
         <form method=\"POST\" action=\"{route}/{id}/delete\" class=\"inline\" onsubmit=\"return confirm('Are you sure?')\">\n                        \
         <input type=\"hidden\" name=\"_token\" value=\"{token}\">\n                        \
         <button type=\"submit\" class=\"btn btn-sm btn-danger\">Delete</button>\n                    \
         </form>\n                </td>\n            </tr>\n",
        route = n.route,
        token = expr("csrf_token"),
    );
    let _ = writeln!(out, "            {}", tag("endfor"));
    out.push_str("        </tbody>\n    </table>\n\n");
    let _ = write!(
        out,
        "    <div class=\"pagination\">\n        Showing {} to {} of {} results\n        \
         {}<a href=\"{route}?page={}\">Previous</a>{}\n        \
         {}<a href=\"{route}?page={}\">Next</a>{}\n    </div>\n",
        expr("items.from"),
        expr("items.to"),
        expr("items.total"),
        tag("if items.current_page > 1"),
        expr("items.current_page - 1"),
        tag("endif"),
        tag("if items.current_page < items.last_page"),
        expr("items.current_page + 1"),
        tag("endif"),
        route = n.route,
    );
    let _ = writeln!(out, "    {}", tag("else"));
    let _ = writeln!(
        out,
        "    <p class=\"empty\">No {} found. <a href=\"{}/create\">Create the first one</a>.</p>",
        n.table,
        n.route
    );
    let _ = writeln!(out, "    {}", tag("endif"));
    out.push_str(&close());
    out
}

fn detail(field: &Field) -> String {
    let var = format!("item.{}", field.name());
    match field.kind {
        FieldKind::Boolean => badge(&var),
        kind if kind.is_temporal() => formatted_date(&var, kind),
        FieldKind::Email => when_set(&var, format!("<a href=\"mailto:{0}\">{0}</a>", expr(&var))),
        FieldKind::Url => when_set(&var, format!("<a href=\"{0}\" target=\"_blank\" rel=\"noopener\">{0}</a>", expr(&var))),
        FieldKind::Json => format!("<pre>{}</pre>", expr(&format!("{var} | json_encode(pretty=true)"))),
        FieldKind::Password => "********".to_string(),
        FieldKind::Text => when_set(&var, expr(&format!("{var} | linebreaksbr"))),
        _ => expr(&var),
    }
}

pub fn show(plan: &ScaffoldPlan) -> String {
    let n = &plan.naming;
    let id = expr(&format!("item.{}", plan.primary_key()));
    let mut out = open(plan);
    let _ = writeln!(out, "    <h1>{}</h1>\n    <dl class=\"details\">", expr("title"));
    for field in &plan.fields {
        let _ = writeln!(out, "        <dt>{}</dt>\n        <dd>{}</dd>", field.label(), detail(field));
    }
    let _ = write!(
        out,
        "    </dl>\n    <div class=\"actions\">\n        \
         <a href=\"{route}/{id}/edit\" class=\"btn btn-primary\">Edit</a>\n        \
         <a href=\"{route}\" class=\"btn\">Back to list</a>\n    </div>\n",
        route = n.route
    );
    out.push_str(&close());
    out
}

/// A form control for one fillable field. `editing` fills current values from `item`.
fn control(field: &Field, editing: bool) -> String {
    let name = field.name();
    let var = format!("item.{name}");
    let required = if field.is_required() { " required" } else { "" };
    let attrs = format!("name=\"{name}\" id=\"{name}\" class=\"form-control\"{required}");
    match field.kind {
        FieldKind::Boolean => {
            let selected = |yes: bool| {
                if editing {
                    let test = if yes { format!("if {var}") } else { format!("if not {var}") };
                    format!("{} selected{}", tag(&test), tag("endif"))
                } else {
                    let default_yes = field.column.default_value.as_deref().is_some_and(|d| d == "1" || d.eq_ignore_ascii_case("true"));
                    if default_yes == yes { " selected".to_string() } else { String::new() }
                }
            };
            format!(
                "<select {attrs}>\n                <option value=\"1\"{}>Yes</option>\n                <option value=\"0\"{}>No</option>\n            </select>",
                selected(true),
                selected(false)
            )
        }
        FieldKind::Text => {
            let value = if editing { when_set(&var, expr(&var)) } else { String::new() };
            format!("<textarea {attrs} rows=\"5\">{value}</textarea>")
        }
        FieldKind::Json => {
            let value = if editing {
                when_set(&var, expr(&format!("{var} | json_encode(pretty=true)")))
            } else {
                String::new()
            };
            format!("<textarea {attrs} rows=\"5\">{value}</textarea>")
        }
        FieldKind::Password => {
            let placeholder = if editing && !field.is_required() {
                " placeholder=\"Leave blank to keep current\""
            } else {
                ""
            };
            format!("<input type=\"password\" {attrs} value=\"\"{placeholder}>")
        }
        kind => {
            let step = if kind == FieldKind::Float { " step=\"0.01\"" } else { "" };
            let value = match kind {
                _ if !editing => String::new(),
                FieldKind::DateTime | FieldKind::Timestamp => when_set(
                    &var,
                    expr(&format!("{var} | replace(from=\" \", to=\"T\") | truncate(length=16, end=\"\")")),
                ),
                FieldKind::Date => when_set(&var, expr(&format!("{var} | truncate(length=10, end=\"\")"))),
                _ => expr(&var),
            };
            format!("<input type=\"{}\" {attrs}{step} value=\"{value}\">", kind.input_type())
        }
    }
}

fn form(plan: &ScaffoldPlan, editing: bool) -> String {
    let n = &plan.naming;
    let id = expr(&format!("item.{}", plan.primary_key()));
    let (action, submit, cancel) = if editing {
        (format!("{}/{id}/update", n.route), "Update", format!("{}/{id}", n.route))
    } else {
        (n.route.clone(), "Create", n.route.clone())
    };
    let mut out = open(plan);
    let _ = writeln!(out, "    <h1>{}</h1>", expr("title"));
    let _ = writeln!(out, "    <form method=\"POST\" action=\"{action}\">");
    let _ = writeln!(out, "        <input type=\"hidden\" name=\"_token\" value=\"{}\">", expr("csrf_token"));
    for field in plan.fillable() {
        let _ = write!(
            out,
            "        <div class=\"form-group\">\n            <label for=\"{}\">{}</label>\n            {}\n        </div>\n",
            field.name(),
            field.label(),
            control(field, editing)
        );
    }
    let _ = write!(
        out,
        "        <div class=\"actions\">\n            \
         <button type=\"submit\" class=\"btn btn-primary\">{submit} {}</button>\n            \
         <a href=\"{cancel}\" class=\"btn\">Cancel</a>\n        </div>\n    </form>\n",
        n.entity
    );
    out.push_str(&close());
    out
}

pub fn create(plan: &ScaffoldPlan) -> String {
    form(plan, false)
}

pub fn edit(plan: &ScaffoldPlan) -> String {
    form(plan, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::ColumnDescriptor;

    fn plan(admin: bool) -> ScaffoldPlan {
        let columns = vec![
            ColumnDescriptor::new("id", "INTEGER").increments(),
            ColumnDescriptor::new("title", "VARCHAR(255)").not_null(),
            ColumnDescriptor::new("body", "TEXT"),
            ColumnDescriptor::new("price", "DECIMAL(8,2)"),
            ColumnDescriptor::new("contact_email", "VARCHAR(255)"),
            ColumnDescriptor::new("secret_password", "VARCHAR(255)"),
            ColumnDescriptor::new("published", "BOOLEAN").default_value("0"),
            ColumnDescriptor::new("created_at", "DATETIME"),
        ];
        ScaffoldPlan::new("Post", columns, admin)
    }

    #[test]
    fn test_create_controls() {
        let html = create(&plan(false));
        assert!(html.starts_with("{% extends \"layout.html.tera\" %}\n{% block content %}\n"));
        assert!(html.contains("<input type=\"text\" name=\"title\" id=\"title\" class=\"form-control\" required value=\"\">"));
        assert!(html.contains("<textarea name=\"body\" id=\"body\" class=\"form-control\" rows=\"5\"></textarea>"));
        assert!(html.contains("<input type=\"number\" name=\"price\" id=\"price\" class=\"form-control\" step=\"0.01\" value=\"\">"));
        assert!(html.contains("<input type=\"email\" name=\"contact_email\""));
        assert!(html.contains("<select name=\"published\" id=\"published\" class=\"form-control\">"));
        assert!(html.contains("<option value=\"0\" selected>No</option>"));
        assert!(!html.contains("name=\"created_at\""));
        assert!(html.contains("<form method=\"POST\" action=\"/posts\">"));
    }

    #[test]
    fn test_edit_blanks_password() {
        let html = edit(&plan(false));
        assert!(html.contains(
            "<input type=\"password\" name=\"secret_password\" id=\"secret_password\" class=\"form-control\" value=\"\" placeholder=\"Leave blank to keep current\">"
        ));
        assert!(!html.contains("item.secret_password"));
        assert!(html.contains("value=\"{{ item.title }}\""));
        assert!(html.contains("<option value=\"1\"{% if item.published %} selected{% endif %}>Yes</option>"));
        assert!(html.contains("action=\"/posts/{{ item.id }}/update\""));
    }

    #[test]
    fn test_index_cells() {
        let html = index(&plan(true));
        assert!(html.starts_with("{% extends \"admin/layout.html.tera\" %}"));
        assert!(html.contains("<th>Id</th>\n                <th>Title</th>\n                <th>Body</th>\n                <th>Price</th>\n                <th>Contact Email</th>\n                <th>Actions</th>"));
        assert!(html.contains("{% if item.body %}{{ item.body | truncate(length=50) }}{% endif %}"));
        assert!(html.contains("<a href=\"mailto:{{ item.contact_email }}\">"));
        assert!(html.contains("href=\"/admin-posts/{{ item.id }}/edit\""));
    }

    #[test]
    fn test_show_formats() {
        let html = show(&plan(false));
        assert!(html.contains("<span class=\"badge badge-success\">Yes</span>"));
        assert!(html.contains("{{ item.body | linebreaksbr }}"));
        assert!(html.contains("date(format=\"%b %d, %Y %H:%M\")"));
        assert!(html.contains("<dd>********</dd>"));
    }
}
