use anyhow::{Error, Result};
use clap::Parser;
use farme_core::inspect;
use farme_core::scaffold::{Naming, Outcome, Scaffold, ScaffoldPlan, Scaffolder};
use time::OffsetDateTime;

use crate::util::{error, info, success, warning, Settings};
use crate::Global;

#[derive(Parser, Debug)]
pub struct MakeCrud {
    /// Entity name, e.g. `Post`. The table is the lowercased name plus `s`.
    entity: String,

    #[clap(long)]
    /// Generate admin handlers and views guarded by authentication.
    admin: bool,
}

impl MakeCrud {
    pub fn run(self, global: &Global) -> Result<()> {
        let settings = Settings::load(global)?;
        let paths = settings.paths()?;
        let naming = Naming::new(&self.entity, self.admin);
        let connection = global.connection.as_deref();
        info(format!("Generating CRUD for {} (table `{}`)", naming.entity, naming.table));

        let mut db = settings.open()?;
        let driver = db.driver(connection).unwrap_or_default();
        let columns = match inspect::try_columns(&mut db, connection, &naming.table) {
            Ok(columns) if !columns.is_empty() => {
                success(format!("Found {} columns in `{}`", columns.len(), naming.table));
                columns
            }
            Ok(_) => {
                warning(format!("Table `{}` not found, using default fields", naming.table));
                Vec::new()
            }
            Err(e) => {
                error(format!("Could not inspect `{}`: {e}", naming.table));
                warning("Using default fields");
                Vec::new()
            }
        };

        let plan = ScaffoldPlan::new(&self.entity, columns, self.admin).dialect(driver);
        let scaffold = Scaffold::render(&plan);
        let report = Scaffolder::new(paths).write(&scaffold, OffsetDateTime::now_utc());
        for artifact in &report.artifacts {
            let path = artifact.path.display();
            match &artifact.outcome {
                Outcome::Created => success(format!("Created {}: {path}", artifact.kind)),
                Outcome::Skipped => warning(format!("{} already exists, skipping: {path}", artifact.kind)),
                Outcome::Failed(e) => error(format!("Failed to write {} {path}: {e}", artifact.kind)),
            }
        }

        if !report.is_success() {
            return Err(Error::msg(format!("Some files for {} could not be generated.", naming.entity)));
        }
        info(format!(
            "Next: add `pub mod {};` to your models module and mount `{}::routes()`.",
            naming.module,
            naming.controller_file().trim_end_matches(".rs")
        ));
        Ok(())
    }
}
