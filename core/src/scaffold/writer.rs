use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, warn};

use super::Scaffold;
use crate::config::Paths;
use crate::error::Result;
use crate::migration::{self, MigrationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Controller,
    View,
    Migration,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => f.write_str("model"),
            ArtifactKind::Controller => f.write_str("controller"),
            ArtifactKind::View => f.write_str("view"),
            ArtifactKind::Migration => f.write_str("migration"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    /// The target already existed and was left alone.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub artifacts: Vec<Artifact>,
}

impl ScaffoldReport {
    fn push(&mut self, kind: ArtifactKind, path: PathBuf, outcome: Outcome) {
        self.artifacts.push(Artifact { kind, path, outcome });
    }

    pub fn created(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.outcome == Outcome::Created)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.outcome == Outcome::Skipped)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| matches!(a.outcome, Outcome::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Writes a rendered [`Scaffold`] to disk without overwriting anything.
#[derive(Debug, Clone)]
pub struct Scaffolder {
    paths: Paths,
}

fn write_new(path: &Path, contents: &str) -> Outcome {
    if path.exists() {
        warn!(path = %path.display(), "file already exists, skipping");
        return Outcome::Skipped;
    }
    let written = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(path, contents));
    match written {
        Ok(()) => {
            debug!(path = %path.display(), "created");
            Outcome::Created
        }
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

impl Scaffolder {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Write every artifact. A failing artifact is recorded and the rest are still attempted.
    pub fn write(&self, scaffold: &Scaffold, now: OffsetDateTime) -> ScaffoldReport {
        let naming = &scaffold.naming;
        let mut report = ScaffoldReport::default();

        let path = self.paths.models.join(naming.model_file());
        let outcome = write_new(&path, &scaffold.model);
        report.push(ArtifactKind::Model, path, outcome);

        let path = self.paths.controllers.join(naming.controller_file());
        let outcome = write_new(&path, &scaffold.controller);
        report.push(ArtifactKind::Controller, path, outcome);

        let view_dir = self.paths.templates.join(&naming.view_dir);
        for (view, source) in &scaffold.views {
            let path = view_dir.join(format!("{view}.html.tera"));
            let outcome = write_new(&path, source);
            report.push(ArtifactKind::View, path, outcome);
        }

        if let Some((up, down)) = &scaffold.migration {
            match self.write_migration(&scaffold.migration_name, up, down, now) {
                Ok(artifacts) => report.artifacts.extend(artifacts),
                Err(e) => report.push(ArtifactKind::Migration, self.paths.migrations.clone(), Outcome::Failed(e.to_string())),
            }
        }
        report
    }

    fn write_migration(&self, name: &str, up: &str, down: &str, now: OffsetDateTime) -> Result<Vec<Artifact>> {
        let folder = &self.paths.migrations;
        fs::create_dir_all(folder)?;
        if let Some(existing) = migration::discover(folder)?.into_iter().find(|m| m.name.contains(name)) {
            warn!(migration = %existing.name, "migration already exists, skipping");
            let path = existing.path().map_or_else(|| folder.clone(), Path::to_path_buf);
            return Ok(vec![Artifact {
                kind: ArtifactKind::Migration,
                path,
                outcome: Outcome::Skipped,
            }]);
        }
        let id = format!("{}_{name}", migration::format_timestamp(now)?);
        Ok([(MigrationType::Up, up), (MigrationType::Down, down)]
            .into_iter()
            .map(|(ty, contents)| {
                let path = folder.join(format!("{id}.{}", ty.extension()));
                let outcome = write_new(&path, contents);
                Artifact {
                    kind: ArtifactKind::Migration,
                    path,
                    outcome,
                }
            })
            .collect())
    }
}
