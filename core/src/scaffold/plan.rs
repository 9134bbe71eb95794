use heck::{ToSnakeCase, ToTitleCase};

use super::classify::{classify, FieldKind};
use crate::config::Driver;
use crate::inspect::ColumnDescriptor;
use crate::model::Cast;

/// Index views show at most this many columns.
const MAX_DISPLAY_COLUMNS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub column: ColumnDescriptor,
    pub kind: FieldKind,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.column.name
    }

    /// Human label, `author_email` becomes `Author Email`.
    pub fn label(&self) -> String {
        self.column.name.to_title_case()
    }

    pub fn is_required(&self) -> bool {
        !self.column.nullable
    }
}

/// Names derived from the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    /// As given, e.g. `BlogPost`.
    pub entity: String,
    /// Module and file stem, `blog_post`.
    pub module: String,
    /// Table, `blogposts`.
    pub table: String,
    /// Naming base for handlers and the controller file, `blogposts` or `admin_blogposts`.
    pub plural: String,
    /// Template directory relative to the templates root.
    pub view_dir: String,
    /// Route path prefix, `/blogposts` or `/admin-blogposts`.
    pub route: String,
}

impl Naming {
    pub fn new(entity: &str, admin: bool) -> Self {
        let lower = entity.to_lowercase();
        let table = format!("{lower}s");
        let (plural, view_dir, route) = if admin {
            (
                format!("admin_{table}"),
                format!("admin/{table}"),
                format!("/admin-{table}"),
            )
        } else {
            (table.clone(), table.clone(), format!("/{table}"))
        };
        Self {
            entity: entity.to_string(),
            module: entity.to_snake_case(),
            table,
            plural,
            view_dir,
            route,
        }
    }

    pub fn controller_file(&self) -> String {
        format!("{}_controller.rs", self.plural)
    }

    pub fn model_file(&self) -> String {
        format!("{}.rs", self.module)
    }
}

/// Everything the renderers need about one entity. Built once from introspected columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaffoldPlan {
    pub naming: Naming,
    pub fields: Vec<Field>,
    pub admin: bool,
    /// SQL dialect for the generated migration.
    pub driver: Driver,
    /// True when no columns were available and the default shape was used.
    pub fallback: bool,
}

/// The column shape used when introspection yields nothing.
pub fn fallback_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "INTEGER").increments(),
        ColumnDescriptor::new("name", "VARCHAR(255)").not_null(),
        ColumnDescriptor::new("email", "VARCHAR(255)").not_null(),
        ColumnDescriptor::new("status", "BOOLEAN").not_null().default_value("1"),
        ColumnDescriptor::new("created_at", "DATETIME").default_value("CURRENT_TIMESTAMP"),
        ColumnDescriptor::new("updated_at", "DATETIME").default_value("CURRENT_TIMESTAMP"),
    ]
}

impl ScaffoldPlan {
    pub fn new(entity: &str, columns: Vec<ColumnDescriptor>, admin: bool) -> Self {
        let fallback = columns.is_empty();
        let columns = if fallback { fallback_columns() } else { columns };
        let mut keyed = false;
        let fields = columns
            .into_iter()
            .map(|mut column| {
                let mut kind = classify(&column);
                if kind == FieldKind::Identifier {
                    if keyed {
                        // Only the first auto-increment key is the identifier; the rest of a
                        // composite key are plain columns.
                        column.is_auto_increment = false;
                        column.is_primary_key = false;
                        kind = classify(&column);
                    }
                    keyed = true;
                }
                Field { kind, column }
            })
            .collect();
        Self {
            naming: Naming::new(entity, admin),
            fields,
            admin,
            driver: Driver::Sqlite,
            fallback,
        }
    }

    pub fn dialect(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Mass-assignable fields, in column order.
    pub fn fillable(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.kind.is_fillable())
    }

    /// The identifier column, else the first declared key column, else `id`.
    pub fn primary_key(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.kind == FieldKind::Identifier)
            .or_else(|| self.fields.iter().find(|f| f.column.is_primary_key))
            .map_or("id", |f| f.name())
    }

    /// Whether the primary key holds integers, so route ids must parse as numbers.
    pub fn has_integer_key(&self) -> bool {
        self.field(self.primary_key())
            .map_or(true, |f| matches!(f.kind, FieldKind::Identifier | FieldKind::Integer))
    }

    pub fn has_timestamps(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::Timestamp)
    }

    pub fn casts(&self) -> Vec<(&str, Cast)> {
        self.fields
            .iter()
            .filter_map(|f| f.kind.cast().map(|c| (f.name(), c)))
            .collect()
    }

    /// The field checked for presence on store and update: the first fillable text field, or `name`.
    pub fn validation_field(&self) -> &str {
        self.fillable()
            .find(|f| f.kind.is_textual())
            .map_or("name", |f| f.name())
    }

    /// Columns for the index table: the key, then non-timestamp columns, then `created_at` if
    /// there is room.
    pub fn display_fields(&self) -> Vec<&Field> {
        let pk = self.primary_key();
        let mut shown: Vec<&Field> = self.fields.iter().filter(|f| f.name() == pk).collect();
        shown.extend(
            self.fields
                .iter()
                .filter(|f| f.name() != pk && f.kind != FieldKind::Timestamp)
                .take(MAX_DISPLAY_COLUMNS.saturating_sub(shown.len())),
        );
        if shown.len() < MAX_DISPLAY_COLUMNS {
            if let Some(created) = self.field("created_at") {
                shown.push(created);
            }
        }
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "INTEGER").increments(),
            ColumnDescriptor::new("title", "VARCHAR(255)").not_null(),
            ColumnDescriptor::new("body", "TEXT"),
            ColumnDescriptor::new("published", "BOOLEAN").default_value("0"),
            ColumnDescriptor::new("created_at", "DATETIME"),
            ColumnDescriptor::new("updated_at", "DATETIME"),
        ]
    }

    #[test]
    fn test_naming() {
        let naming = Naming::new("BlogPost", false);
        assert_eq!(naming.module, "blog_post");
        assert_eq!(naming.table, "blogposts");
        assert_eq!(naming.plural, "blogposts");
        assert_eq!(naming.controller_file(), "blogposts_controller.rs");

        let admin = Naming::new("Post", true);
        assert_eq!(admin.plural, "admin_posts");
        assert_eq!(admin.view_dir, "admin/posts");
        assert_eq!(admin.route, "/admin-posts");
        assert_eq!(admin.controller_file(), "admin_posts_controller.rs");
    }

    #[test]
    fn test_posts_plan() {
        let plan = ScaffoldPlan::new("Post", posts(), false);
        let fillable: Vec<&str> = plan.fillable().map(|f| f.name()).collect();
        assert_eq!(fillable, vec!["title", "body", "published"]);
        assert_eq!(plan.primary_key(), "id");
        assert!(plan.has_timestamps());
        assert_eq!(
            plan.casts(),
            vec![
                ("id", Cast::Int),
                ("published", Cast::Bool),
                ("created_at", Cast::DateTime),
                ("updated_at", Cast::DateTime),
            ]
        );
        assert_eq!(plan.validation_field(), "title");
        let shown: Vec<&str> = plan.display_fields().iter().map(|f| f.name()).collect();
        assert_eq!(shown, vec!["id", "title", "body", "published", "created_at"]);
    }

    #[test]
    fn test_display_cap() {
        let mut columns = posts();
        columns.insert(2, ColumnDescriptor::new("slug", "VARCHAR(120)"));
        let plan = ScaffoldPlan::new("Post", columns, false);
        let shown: Vec<&str> = plan.display_fields().iter().map(|f| f.name()).collect();
        assert_eq!(shown, vec!["id", "title", "slug", "body", "published"]);
    }

    #[test]
    fn test_fallback_shape() {
        let plan = ScaffoldPlan::new("Widget", Vec::new(), false);
        assert!(plan.fallback);
        let fillable: Vec<&str> = plan.fillable().map(|f| f.name()).collect();
        assert_eq!(fillable, vec!["name", "email", "status"]);
        assert_eq!(plan.field("status").map(|f| f.kind), Some(FieldKind::Boolean));
        assert_eq!(plan.validation_field(), "name");
    }

    #[test]
    fn test_composite_key_has_one_identifier() {
        let columns = vec![
            ColumnDescriptor::new("post_id", "INTEGER").increments(),
            ColumnDescriptor::new("tag_id", "INTEGER").increments(),
            ColumnDescriptor::new("note", "TEXT"),
        ];
        let plan = ScaffoldPlan::new("PostTag", columns, false);
        assert_eq!(plan.primary_key(), "post_id");
        assert_eq!(plan.field("tag_id").map(|f| f.kind), Some(FieldKind::Integer));
        let fillable: Vec<&str> = plan.fillable().map(|f| f.name()).collect();
        assert_eq!(fillable, vec!["tag_id", "note"]);
        assert!(plan.has_integer_key());
    }

    #[test]
    fn test_text_key() {
        let columns = vec![
            ColumnDescriptor::new("code", "VARCHAR(8)").primary_key(),
            ColumnDescriptor::new("label", "VARCHAR(100)"),
        ];
        let plan = ScaffoldPlan::new("Country", columns, false);
        assert_eq!(plan.primary_key(), "code");
        assert!(!plan.has_integer_key());
    }

    #[test]
    fn test_validation_falls_back_to_name() {
        let columns = vec![
            ColumnDescriptor::new("id", "INTEGER").increments(),
            ColumnDescriptor::new("qty", "INTEGER"),
        ];
        assert_eq!(ScaffoldPlan::new("Stock", columns, false).validation_field(), "name");
    }
}
