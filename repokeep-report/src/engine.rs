//! Tera rendering engine behind [`Renderer`].
//!
//! | Report  | Template            | Written to                           |
//! |---------|---------------------|--------------------------------------|
//! | Update  | `update.log.tera`   | `<root>/logs/update-<stamp>.log`     |
//! | Repair  | `repair.txt.tera`   | stdout (CLI)                         |

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tera::Tera;

use crate::context::{RepairReportContext, UpdateReportContext};
use crate::error::ReportError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("update.log.tera", include_str!("templates/update.log.tera")),
    ("repair.txt.tera", include_str!("templates/repair.txt.tera")),
];

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.into(),
        source,
    }
}

fn build_tera() -> Result<Tera, ReportError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TPLS.iter().copied())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// ReportKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ReportKind {
    Update,
    Repair,
}

impl ReportKind {
    fn template_name(&self) -> &'static str {
        match self {
            ReportKind::Update => "update.log.tera",
            ReportKind::Repair => "repair.txt.tera",
        }
    }
}

/// `update-<YYYYmmdd-HHMMSS>.log` for a run that started at `started`.
pub fn update_log_file_name(started: DateTime<Utc>) -> String {
    format!("update-{}.log", started.format("%Y%m%d-%H%M%S"))
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera engine over the embedded templates.
struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    fn new() -> Result<Self, ReportError> {
        Ok(TemplateEngine { tera: build_tera()? })
    }

    fn render(&self, kind: ReportKind, ctx: &tera::Context) -> Result<String, ReportError> {
        Ok(self.tera.render(kind.template_name(), ctx)?)
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders and writes reports. Create once and reuse.
pub struct Renderer {
    engine: TemplateEngine,
}

impl Renderer {
    pub fn new() -> Result<Self, ReportError> {
        Ok(Renderer {
            engine: TemplateEngine::new()?,
        })
    }

    pub fn render_update(&self, ctx: &UpdateReportContext) -> Result<String, ReportError> {
        self.engine.render(ReportKind::Update, &ctx.to_tera_context()?)
    }

    pub fn render_repair(&self, ctx: &RepairReportContext) -> Result<String, ReportError> {
        self.engine.render(ReportKind::Repair, &ctx.to_tera_context()?)
    }

    /// Render the update log and write it as `logs_dir/<file_name>`.
    pub fn write_update_log(
        &self,
        logs_dir: &Path,
        file_name: &str,
        ctx: &UpdateReportContext,
    ) -> Result<PathBuf, ReportError> {
        let content = self.render_update(ctx)?;
        std::fs::create_dir_all(logs_dir).map_err(|e| io_err(logs_dir, e))?;
        let path = logs_dir.join(file_name);
        std::fs::write(&path, content).map_err(|e| io_err(&path, e))?;
        Ok(path)
    }
}
