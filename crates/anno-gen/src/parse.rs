//! The source front end: tree-sitter parsing plus per-file type tables.

use std::path::{Path, PathBuf};

use tree_sitter::{Parser, Tree};

use anno::{Result, errorf};

use crate::file::SourceFile;
use crate::types::TypeTable;

/// One parsed source file: syntax tree plus its type-resolution table.
pub struct SourceUnit {
    pub file: SourceFile,
    pub tree: Tree,
    pub types: TypeTable,
}

impl SourceUnit {
    /// Exact source text of a syntax node.
    pub fn node_text(&self, node: &tree_sitter::Node<'_>) -> String {
        self.file.node_text(node)
    }
}

/// One logical module: all source files of a single directory, loaded
/// together so extraction and catalog state share a unit of work.
pub struct Module {
    pub dir: PathBuf,
    pub units: Vec<SourceUnit>,
}

pub(crate) fn parse_tree(text: &[u8]) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_rust::LANGUAGE.into())
        .map_err(|e| errorf!("GrammarError: failed to load the Rust grammar").add_source(e))?;

    parser
        .parse(text, None)
        .ok_or_else(|| errorf!("ParseFailed: tree-sitter returned no tree"))
}

/// Parse a single file and build its type table.
pub fn parse_source(file: SourceFile) -> Result<SourceUnit> {
    let tree = parse_tree(file.content())?;
    let types = TypeTable::build(&file, &tree);
    Ok(SourceUnit { file, tree, types })
}

/// Parse an in-memory snippet; used by tests and by the re-derivation of
/// previously generated output.
pub fn parse_str(text: &str) -> Result<SourceUnit> {
    parse_source(SourceFile::new_content(text.as_bytes().to_vec()))
}

/// Load every file of one logical module.
pub fn parse_module(dir: &Path, paths: &[PathBuf]) -> Result<Module> {
    let mut units = Vec::with_capacity(paths.len());
    for path in paths {
        let file = SourceFile::new_path(path)?;
        units.push(parse_source(file)?);
    }
    Ok(Module {
        dir: dir.to_path_buf(),
        units,
    })
}
