//! CRUD scaffolding from introspected columns.
//!
//! Generation runs in three stages: each column is classified into a [`FieldKind`], the kinds
//! are gathered into a [`ScaffoldPlan`], and the plan is rendered into a model module, a
//! controller module, four Tera views and a create-table migration. Only [`Scaffolder`] writes
//! to disk, and it never overwrites an existing file.

use crate::inspect::ColumnDescriptor;

mod classify;
mod controller;
mod migration;
mod model;
mod plan;
mod views;
mod writer;

pub use classify::{classify, FieldKind};
pub use plan::{fallback_columns, Field, Naming, ScaffoldPlan};
pub use writer::{Artifact, ArtifactKind, Outcome, ScaffoldReport, Scaffolder};

/// Rendered sources for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaffold {
    pub naming: Naming,
    pub model: String,
    pub controller: String,
    /// `(view name, template)` for index, show, create and edit.
    pub views: Vec<(&'static str, String)>,
    pub migration_name: String,
    /// Up and down SQL.
    pub migration: Option<(String, String)>,
}

impl Scaffold {
    pub fn render(plan: &ScaffoldPlan) -> Self {
        Self {
            naming: plan.naming.clone(),
            model: model::render(plan),
            controller: controller::render(plan),
            views: vec![
                ("index", views::index(plan)),
                ("show", views::show(plan)),
                ("create", views::create(plan)),
                ("edit", views::edit(plan)),
            ],
            migration_name: migration::name(plan),
            migration: Some(migration::render(plan)),
        }
    }

    /// Drop the migration, for callers that manage schema separately.
    pub fn without_migration(mut self) -> Self {
        self.migration = None;
        self
    }
}

/// Classify `columns` and render every artifact for `entity`.
pub fn generate_crud(entity: &str, columns: Vec<ColumnDescriptor>, admin: bool) -> Scaffold {
    Scaffold::render(&ScaffoldPlan::new(entity, columns, admin))
}
