//! The per-file lowering pipeline.
//!
//! Lowering is strictly sequential within a file: walk the AST, classify
//! imports, build symbol tables, resolve references, interpret options, then
//! validate. The enclosing framework drives files in topological import
//! order and hands dependencies over through the [`Importer`] callback.

pub(crate) mod check;
pub(crate) mod imports;
pub(crate) mod options;
pub(crate) mod resolve;
pub(crate) mod symtab;
pub(crate) mod walk;
#[cfg(test)]
mod tests;

use std::{panic, sync::Arc};

use crate::{
    ast::{self, AstRef},
    comments,
    error::{DiagnosticKind, Label, Report},
    ir::{
        path as file_path, ExtendIndex, File, FileInner, MemberIndex, MessageValueIndex,
        MethodIndex, OneofIndex, RangeIndex, ServiceIndex, Session, TypeIndex,
    },
};

/// Resolves an import declaration to an already-lowered file.
///
/// The framework that schedules lowering implements this; returning
/// [`ImportError::Cycle`] turns into a diagnostic rather than an abort.
pub trait Importer {
    fn import(
        &mut self,
        index: usize,
        canonical_path: &str,
        decl: &ast::ImportDecl,
    ) -> Result<File, ImportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The import would close a cycle in the file graph.
    Cycle,
    NotFound,
    Failed(String),
}

/// The entity an option declaration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OptionSubject {
    File,
    Type(TypeIndex),
    Member(MemberIndex),
    Oneof(OneofIndex),
    Range(RangeIndex),
    Service(ServiceIndex),
    Method(MethodIndex),
}

/// Work the walker defers to later passes, keyed back to the AST.
pub(crate) struct Pending<'ast> {
    pub(crate) fields: Vec<(MemberIndex, &'ast ast::FieldDecl)>,
    pub(crate) extends: Vec<(ExtendIndex, &'ast ast::ExtendDecl)>,
    pub(crate) methods: Vec<(MethodIndex, &'ast ast::MethodDecl)>,
    pub(crate) options: Vec<(OptionSubject, &'ast ast::OptionDecl)>,
}

pub(crate) struct FileBuilder<'ast> {
    pub(crate) file: FileInner,
    pub(crate) pending: Pending<'ast>,
}

impl<'ast> FileBuilder<'ast> {
    fn new(path: String, original_path: String) -> FileBuilder<'ast> {
        FileBuilder {
            file: FileInner::new(path, original_path),
            pending: Pending {
                fields: Vec::new(),
                extends: Vec::new(),
                methods: Vec::new(),
                options: Vec::new(),
            },
        }
    }

    pub(crate) fn options_slot(&mut self, subject: OptionSubject) -> &mut Option<MessageValueIndex> {
        match subject {
            OptionSubject::File => &mut self.file.options,
            OptionSubject::Type(i) => &mut self.file.types[i.index()].options,
            OptionSubject::Member(i) => &mut self.file.members[i.index()].options,
            OptionSubject::Oneof(i) => &mut self.file.oneofs[i.index()].options,
            OptionSubject::Range(i) => &mut self.file.ranges[i.index()].options,
            OptionSubject::Service(i) => &mut self.file.services[i.index()].options,
            OptionSubject::Method(i) => &mut self.file.methods[i.index()].options,
        }
    }
}

impl Session {
    /// Lowers one parsed file into the session.
    ///
    /// Every problem lands in `report`; the returned file is always usable
    /// by importers, though emission should be gated on
    /// [`Report::has_errors`]. Internal panics are caught and surfaced as
    /// error diagnostics.
    pub fn lower(
        &self,
        ast: ast::SourceFile,
        importer: &mut dyn Importer,
        report: &mut Report,
    ) -> File {
        let start = report.len();
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.lower_inner(&ast, importer, report)
        }));
        let inner = match result {
            Ok(inner) => inner,
            Err(payload) => {
                report.push(DiagnosticKind::Internal {
                    message: payload_message(payload),
                    file: ast.path.clone(),
                });
                FileInner::new(ast.path.clone(), ast.path.clone())
            }
        };
        report.sort_from(start);
        File {
            session: self.clone(),
            inner: Arc::new(inner),
        }
    }

    fn lower_inner(
        &self,
        ast: &ast::SourceFile,
        importer: &mut dyn Importer,
        report: &mut Report,
    ) -> FileInner {
        let interner = self.interner();

        let canonical = match file_path::canonicalize(&ast.path) {
            Ok(canonical) => {
                if canonical.has_drive_prefix {
                    report.push(DiagnosticKind::DriveLetterPath {
                        path: ast.path.clone(),
                        found: Label::new("file added here", &ast.path, ast.span),
                    });
                }
                canonical.path
            }
            Err(problem) => {
                report.push(DiagnosticKind::InvalidImportPath {
                    path: ast.path.clone(),
                    reason: problem.to_string(),
                    found: Label::new("file added here", &ast.path, ast.span),
                });
                ast.path.clone()
            }
        };

        let mut builder = FileBuilder::new(canonical, ast.path.clone());
        builder.file.span = ast.span;
        builder.file.comments = comments::track(&ast.tokens);
        match ast.syntax {
            Some(decl) => {
                builder.file.syntax = decl.syntax;
                builder.file.syntax_ast = Some(AstRef::new(decl.span, decl.token));
            }
            None => builder.file.syntax_unspecified = true,
        }
        if let Some(package) = &ast.package {
            builder.file.package = interner.intern(&package.name);
            builder.file.package_ast = Some(AstRef::new(package.span, package.token));
        }

        walk::walk(self, &mut builder, ast, report);
        imports::build(self, &mut builder, ast, importer, report);
        symtab::build(self, &mut builder.file, report);
        resolve::run(self, &mut builder, report);
        options::run(self, &mut builder, report);
        check::run(self, &mut builder.file, report);

        builder.file
    }
}

/// The default JSON name of a field: lowerCamelCase of the declared name.
pub(crate) fn to_json_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = false;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

fn payload_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during lowering".to_owned()
    }
}

