//! What a module imports and exports.
//!
//! Binding generators append a hash to import names
//! (`__wbg_createElement_964ab674a0176cd8`), so imports are matched against
//! the import table by their logical name (`createElement`).

use alloc::{string::String, string::ToString, vec::Vec};
use log::debug;
use wasmparser::{ExternalKind, Parser, Payload, TypeRef};

use crate::Result;

const GENERATED_PREFIX: &str = "__wbg_";
const HASH_LEN: usize = 16;

/// The binding an import name refers to
///
/// Strips the generator prefix and hash suffix; names without the prefix
/// are returned unchanged.
pub fn binding_name(import: &str) -> &str {
    let Some(name) = import.strip_prefix(GENERATED_PREFIX) else {
        return import;
    };

    match name.rsplit_once('_') {
        Some((base, hash))
            if !base.is_empty()
                && hash.len() == HASH_LEN
                && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) =>
        {
            base
        }
        _ => name,
    }
}

/// Kind of an imported item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Func,
    Table,
    Memory,
    Global,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub kind: ImportKind,
}

impl Import {
    /// The logical binding name of this import
    pub fn binding(&self) -> &str {
        binding_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExternalKind,
}

/// The import and export lists of a module binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
}

impl Manifest {
    /// Read the import and export sections of a module binary
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut manifest = Self::default();

        for payload in Parser::new(0).parse_all(bytes) {
            match payload? {
                Payload::ImportSection(reader) => {
                    for group in reader {
                        for import in group? {
                            let (_offset, import) = import?;
                            let kind = match import.ty {
                                TypeRef::Func(_) => ImportKind::Func,
                                TypeRef::Table(_) => ImportKind::Table,
                                TypeRef::Memory(_) => ImportKind::Memory,
                                TypeRef::Global(_) => ImportKind::Global,
                                _ => ImportKind::Tag,
                            };
                            manifest.imports.push(Import {
                                module: import.module.to_string(),
                                name: import.name.to_string(),
                                kind,
                            });
                        }
                    }
                }
                Payload::ExportSection(reader) => {
                    for export in reader {
                        let export = export?;
                        manifest.exports.push(Export { name: export.name.to_string(), kind: export.kind });
                    }
                }
                _ => {}
            }
        }

        debug!("module imports {} items and exports {}", manifest.imports.len(), manifest.exports.len());
        Ok(manifest)
    }

    /// Function imports from `module`
    pub fn function_imports<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Import> + 'a {
        self.imports.iter().filter(move |import| import.kind == ImportKind::Func && import.module == module)
    }

    /// Whether the module exports a function with this name
    pub fn exports_func(&self, name: &str) -> bool {
        self.exports.iter().any(|export| export.kind == ExternalKind::Func && export.name == name)
    }

    pub fn exports_memory(&self, name: &str) -> bool {
        self.exports.iter().any(|export| export.kind == ExternalKind::Memory && export.name == name)
    }
}
