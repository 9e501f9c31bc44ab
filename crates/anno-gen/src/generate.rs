//! The generation driver: walks a source tree, runs the pipeline once per
//! directory-module, and writes declarations and call-site rewrites.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use anno::{Error, Result, errorf};

use crate::TR_IS_NON_FATAL;
use crate::catalog::{Catalog, Field, KindSignature, Resolution, parse_template};
use crate::extract::{CallSite, extract_call_sites};
use crate::parse::{Module, SourceUnit, parse_module};
use crate::patch::{Rewrite, append_or_create, apply_rewrites, backup_and_overwrite};
use crate::prev::load_previous;
use crate::synth::{
    DEFAULT_IMPORT, FAILED_FILE, GENERATED_FILE, pascal_to_snake, render_header, render_kind,
    render_use_lines, validate,
};

/// What one invocation did, for terminal reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct Report {
    pub modules: usize,
    pub kinds: usize,
    pub rewrites: usize,
}

/// Run generation over every directory-module under `dir`.
///
/// A failed unit aborts only its own module's output for that file; the
/// walk continues, and the first failure is reported at the end.
pub fn generate_dir(dir: &Path) -> Result<Report> {
    let mut report = Report::default();
    let mut first_failure: Option<Error> = None;

    for (module_dir, paths) in discover(dir)? {
        // A module that fails to load is handled like one that fails to
        // generate: warned, remembered, and walked past.
        let outcome =
            parse_module(&module_dir, &paths).and_then(|module| generate_module(&module));
        match outcome {
            Ok(module_report) => {
                report.modules += 1;
                report.kinds += module_report.kinds;
                report.rewrites += module_report.rewrites;
            }
            Err(err) => {
                warn!("module {} failed:\n{}", module_dir.display(), err.strace());
                first_failure.get_or_insert(err);
            }
        }
    }

    match first_failure {
        Some(err) => Err(errorf!("GenerateFailed: one or more modules failed")
            .add_op("Generate")
            .add_error(err)),
        None => Ok(report),
    }
}

/// Run the pipeline for one module: load the previous catalog, extract and
/// resolve every call site, then write the declarations file and the
/// patched sources.
pub fn generate_module(module: &Module) -> Result<Report> {
    let gen_path = module.dir.join(GENERATED_FILE);
    let mut catalog = Catalog::new(load_previous(&gen_path)?);
    let mut imports = BTreeSet::new();
    imports.insert(DEFAULT_IMPORT.to_string());

    // A failed unit loses only its own sites; the rest of the module
    // still generates, and the first failure is reported upward.
    let mut patched: Vec<(&SourceUnit, Vec<Rewrite>)> = Vec::new();
    let mut first_failure: Option<Error> = None;
    for unit in &module.units {
        match process_unit(unit, &mut catalog, &mut imports) {
            Ok(rewrites) => {
                if !rewrites.is_empty() {
                    patched.push((unit, rewrites));
                }
            }
            Err(err) => {
                let file = unit.file.path().unwrap_or("<memory>");
                warn!("unit {} failed:\n{}", file, err.strace());
                first_failure.get_or_insert(err);
            }
        }
    }

    if !catalog.has_fresh() {
        if let Some(err) = first_failure {
            return Err(err);
        }
        debug!(dir = %module.dir.display(), "no new kinds");
        return Ok(Report::default());
    }

    let mut decls = String::new();
    for sig in catalog.fresh() {
        decls.push('\n');
        decls.push_str(&render_kind(sig));
    }
    let header = render_header();
    let use_lines = render_use_lines(&imports);

    // Nothing reaches disk unless the assembled output parses.
    let mut preview = header.clone();
    preview.push('\n');
    for line in &use_lines {
        preview.push_str(line);
        preview.push('\n');
    }
    preview.push_str(&decls);
    if let Err(err) = validate(&preview) {
        let failed = module.dir.join(FAILED_FILE);
        let _ = fs::write(&failed, &preview);
        warn!("invalid output kept at {}", failed.display());
        return Err(err.add_op("GenerateErrorFile"));
    }

    append_or_create(&gen_path, &header, &use_lines, &decls)
        .map_err(|e| e.add_op("GenerateErrorFile"))?;

    let mut report = Report {
        modules: 1,
        kinds: catalog.fresh().count(),
        rewrites: 0,
    };
    for (unit, rewrites) in patched {
        let text = apply_rewrites(&unit.file.get_full_text(), &rewrites);
        let path = unit.file.path().unwrap_or_default();
        backup_and_overwrite(Path::new(path), &text)?;
        report.rewrites += rewrites.len();
    }

    info!(
        dir = %module.dir.display(),
        kinds = report.kinds,
        rewrites = report.rewrites,
        "generated"
    );
    match first_failure {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

/// Extract and resolve one unit's call sites, producing its rewrites.
fn process_unit(
    unit: &SourceUnit,
    catalog: &mut Catalog,
    imports: &mut BTreeSet<String>,
) -> Result<Vec<Rewrite>> {
    let file = unit.file.path().unwrap_or("<memory>").to_string();
    let mut rewrites: Vec<Rewrite> = Vec::new();

    for site in extract_call_sites(unit)? {
        // Sites arrive outermost first; a call nested in an already
        // rewritten argument list would splice into dead text.
        if rewrites
            .iter()
            .any(|r| r.range.start <= site.range.start && site.range.end <= r.range.end)
        {
            debug!("{}:{}:{}: nested call left as written", file, site.row, site.column);
            continue;
        }

        let (name, message) = parse_template(&site.template)
            .map_err(|e| e.add_op("GenerateKind"))?;
        let sig = KindSignature {
            name,
            message,
            fields: site
                .fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                })
                .collect(),
        };

        match catalog.resolve(&sig) {
            Resolution::Accept => {
                imports.extend(site.imports.iter().cloned());
                rewrites.push(rewrite_for(&site, &sig));
                catalog.accept(sig);
            }
            Resolution::AlreadyDefined => {
                let note = errorf!(
                    "AlreadyDefined: {} at {}:{}:{} is already declared",
                    sig.name, file, site.row, site.column
                )
                .add_trait(TR_IS_NON_FATAL, "true");
                debug!("{}", note.message());
            }
            Resolution::Conflict => {
                warn!(
                    "Conflict: {} at {}:{}:{} clashes with an existing declaration; call left as written",
                    sig.name, file, site.row, site.column
                );
            }
        }
    }
    Ok(rewrites)
}

/// The constructor call that replaces an accepted macro invocation.
fn rewrite_for(site: &CallSite, sig: &KindSignature) -> Rewrite {
    let args = site
        .fields
        .iter()
        .map(|f| f.expr.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Rewrite {
        range: site.range.clone(),
        replacement: format!("err_{}({})", pascal_to_snake(sig.word()), args),
    }
}

/// All non-generated `.rs` files under `dir`, grouped by directory.
/// `.gitignore` rules and hidden directories are respected.
fn discover(dir: &Path) -> Result<BTreeMap<PathBuf, Vec<PathBuf>>> {
    if !dir.is_dir() {
        return Err(errorf!("PathNotFound: {} is not a directory", dir.display()));
    }

    let mut modules: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkBuilder::new(dir).build() {
        let entry =
            entry.map_err(|e| errorf!("FailedToRead: walk of {} failed", dir.display()).add_source(e))?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if path.extension().is_none_or(|ext| ext != "rs") {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name == GENERATED_FILE || name == FAILED_FILE {
            continue;
        }
        let parent = path.parent().unwrap_or(dir).to_path_buf();
        modules.entry(parent).or_default().push(path.to_path_buf());
    }
    for paths in modules.values_mut() {
        paths.sort();
    }
    Ok(modules)
}
