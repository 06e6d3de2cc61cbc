//! The per-file import table.
//!
//! Entries are segmented as `[public | weak | regular | transitive-public |
//! transitive-other | descriptor.proto]`. Direct public imports sit first so
//! that recursion reaches transitive imports through public edges before
//! private ones; in diamond configurations that ordering is what keeps a
//! file public that is reachable both ways. Weak imports do not propagate.

use std::{collections::HashMap, sync::Arc};

use crate::{
    ast::{self, AstRef, ImportKind, Syntax},
    error::{DiagnosticKind, Label, Report},
    ir::{
        build::{FileBuilder, Importer, ImportError},
        builtin,
        intern::InternId,
        path as file_path, FileInner, FileSlot, Session,
    },
};

/// Resolves the file's import declarations through the importer callback
/// and builds the sealed table.
pub(crate) fn build(
    session: &Session,
    builder: &mut FileBuilder<'_>,
    ast: &ast::SourceFile,
    importer: &mut dyn Importer,
    report: &mut Report,
) {
    let interner = session.interner();
    let file_path_str = builder.file.path.clone();

    for (index, decl) in ast.imports.iter().enumerate() {
        // `import option` visibility filtering only exists from Edition
        // 2024 on.
        if decl.kind == ImportKind::Option && builder.file.syntax < Syntax::Edition(2024) {
            report.push(DiagnosticKind::EditionTooOld {
                feature: "import option".to_owned(),
                edition: describe_syntax(builder.file.syntax),
                introduced: "2024".to_owned(),
                found: Label::new("declared here", &file_path_str, decl.span),
            });
        }

        let canonical = match file_path::canonicalize(&decl.path) {
            Ok(canonical) => {
                if canonical.has_drive_prefix {
                    report.push(DiagnosticKind::DriveLetterPath {
                        path: decl.path.clone(),
                        found: Label::new("imported here", &file_path_str, decl.span),
                    });
                }
                canonical.path
            }
            Err(problem) => {
                report.push(DiagnosticKind::InvalidImportPath {
                    path: decl.path.clone(),
                    reason: problem.to_string(),
                    found: Label::new("imported here", &file_path_str, decl.span),
                });
                continue;
            }
        };

        let path_id = interner.intern(&canonical);
        if builder.file.imports.contains(path_id) {
            // A duplicate import only needs one entry; the first wins.
            continue;
        }

        let file = if canonical == builtin::DESCRIPTOR_PATH {
            Ok(session.descriptor_file())
        } else {
            importer.import(index, &canonical, decl)
        };
        match file {
            Ok(file) => builder.file.imports.add_direct(
                file.inner.clone(),
                path_id,
                decl.path.clone(),
                decl.kind,
                AstRef::new(decl.span, decl.token),
            ),
            Err(ImportError::Cycle) => report.push(DiagnosticKind::ImportCycle {
                path: decl.path.clone(),
                found: Label::new("imported here", &file_path_str, decl.span),
            }),
            Err(_) => report.push(DiagnosticKind::ImportNotFound {
                path: decl.path.clone(),
                found: Label::new("imported here", &file_path_str, decl.span),
            }),
        }
    }

    let self_path = interner.intern(&builder.file.path);
    builder.file.imports.recurse(self_path);
    builder.file.imports.seal(
        session.shared.descriptor.clone(),
        interner.intern(builtin::DESCRIPTOR_PATH),
    );
}

pub(crate) fn describe_syntax(syntax: Syntax) -> String {
    match syntax {
        Syntax::Proto2 => "proto2".to_owned(),
        Syntax::Proto3 => "proto3".to_owned(),
        Syntax::Edition(year) => year.to_string(),
    }
}

#[derive(Debug)]
pub(crate) struct ImportEntry {
    pub(crate) file: Arc<FileInner>,
    /// Canonical path, interned in the session pool.
    pub(crate) path: InternId,
    /// The import string as written; empty for transitive entries.
    pub(crate) original: String,
    /// `None` for transitive entries and the implicit descriptor entry.
    pub(crate) kind: Option<ImportKind>,
    pub(crate) decl: Option<AstRef>,
    /// Symbols from invisible files are present in the merged table but may
    /// not be referenced.
    pub(crate) visible: bool,
    /// The file's exports are re-exported from here: a direct public
    /// import, or a transitive import reached over public edges only.
    pub(crate) reexport: bool,
    /// Set when a resolution succeeds through this import.
    pub(crate) used: bool,
}

impl ImportEntry {
    pub(crate) fn is_public_reexport(&self) -> bool {
        self.reexport
    }

    fn is_weak(&self) -> bool {
        self.kind == Some(ImportKind::Weak)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ImportTable {
    entries: Vec<ImportEntry>,
    public_end: usize,
    weak_end: usize,
    import_end: usize,
    trans_public_end: usize,
    /// One bit per entry position, set for files whose symbols may be
    /// referenced from this file. Built by [`ImportTable::seal`].
    visible: Vec<u64>,
    by_path: HashMap<InternId, u32>,
}

impl ImportTable {
    pub(crate) fn entries(&self) -> &[ImportEntry] {
        &self.entries
    }

    pub(crate) fn entry(&self, slot: FileSlot) -> &ImportEntry {
        &self.entries[slot.index()]
    }

    pub(crate) fn entry_mut(&mut self, slot: FileSlot) -> &mut ImportEntry {
        &mut self.entries[slot.index()]
    }

    pub(crate) fn file(&self, slot: FileSlot) -> Arc<FileInner> {
        self.entries[slot.index()].file.clone()
    }

    /// Direct imports, in table order (public, weak, then regular).
    pub(crate) fn direct(&self) -> &[ImportEntry] {
        &self.entries[..self.import_end]
    }

    pub(crate) fn slot_of(&self, path: InternId) -> Option<FileSlot> {
        self.by_path.get(&path).map(|&slot| FileSlot(slot))
    }

    pub(crate) fn is_visible(&self, slot: FileSlot) -> bool {
        let i = slot.index();
        self.visible
            .get(i / 64)
            .map(|word| word & (1 << (i % 64)) != 0)
            .unwrap_or(false)
    }

    pub(crate) fn contains(&self, path: InternId) -> bool {
        self.entries.iter().any(|entry| entry.path == path)
    }

    /// Installs a direct import at the end of its segment.
    pub(crate) fn add_direct(
        &mut self,
        file: Arc<FileInner>,
        path: InternId,
        original: String,
        kind: ImportKind,
        decl: AstRef,
    ) {
        let at = match kind {
            ImportKind::Public => self.bump_public(),
            ImportKind::Weak => self.bump_weak(),
            ImportKind::Default | ImportKind::Option => self.bump_regular(),
        };
        self.entries.insert(
            at,
            ImportEntry {
                file,
                path,
                original,
                kind: Some(kind),
                decl: Some(decl),
                visible: true,
                reexport: kind == ImportKind::Public,
                used: false,
            },
        );
    }

    fn bump_public(&mut self) -> usize {
        let at = self.public_end;
        self.public_end += 1;
        self.weak_end += 1;
        self.import_end += 1;
        self.trans_public_end += 1;
        at
    }

    fn bump_weak(&mut self) -> usize {
        let at = self.weak_end;
        self.weak_end += 1;
        self.import_end += 1;
        self.trans_public_end += 1;
        at
    }

    fn bump_regular(&mut self) -> usize {
        let at = self.import_end;
        self.import_end += 1;
        self.trans_public_end += 1;
        at
    }

    /// Adds the transitive closure of every direct import. Direct imports
    /// must all be installed first.
    pub(crate) fn recurse(&mut self, self_path: InternId) {
        let mut seen: HashMap<InternId, usize> = HashMap::new();
        seen.insert(self_path, usize::MAX);
        for (i, entry) in self.entries.iter().enumerate() {
            seen.insert(entry.path, i);
        }

        // Direct entries are stable: later inserts only land at or past
        // `import_end`.
        for i in 0..self.import_end {
            if self.entries[i].is_weak() {
                continue;
            }
            let via_public = self.entries[i].kind == Some(ImportKind::Public);
            let dep = self.entries[i].file.clone();

            for dep_entry in dep.imports.entries() {
                if dep_entry.is_weak() || dep_entry.file.is_descriptor() {
                    continue;
                }
                let public_from_dep = dep_entry.reexport;
                let reexport_here = via_public && public_from_dep;

                match seen.get(&dep_entry.path).copied() {
                    Some(usize::MAX) => {}
                    Some(at) => {
                        let entry = &mut self.entries[at];
                        entry.visible |= public_from_dep;
                        entry.reexport |= reexport_here;
                        if reexport_here && at >= self.trans_public_end {
                            self.promote_transitive(at, &mut seen);
                        }
                    }
                    None => {
                        let entry = ImportEntry {
                            file: dep_entry.file.clone(),
                            path: dep_entry.path,
                            original: String::new(),
                            kind: None,
                            decl: None,
                            visible: public_from_dep,
                            reexport: reexport_here,
                            used: false,
                        };
                        let at = if reexport_here {
                            let at = self.trans_public_end;
                            self.trans_public_end += 1;
                            self.entries.insert(at, entry);
                            for slot in seen.values_mut() {
                                if *slot != usize::MAX && *slot >= at {
                                    *slot += 1;
                                }
                            }
                            at
                        } else {
                            self.entries.push(entry);
                            self.entries.len() - 1
                        };
                        seen.insert(self.entries[at].path, at);
                    }
                }
            }
        }
    }

    /// Moves a transitive-other entry into the transitive-public segment
    /// after a later public-only path reached it.
    fn promote_transitive(&mut self, at: usize, seen: &mut HashMap<InternId, usize>) {
        debug_assert!(at >= self.trans_public_end);
        let entry = self.entries.remove(at);
        let to = self.trans_public_end;
        self.trans_public_end += 1;
        self.entries.insert(to, entry);
        for slot in seen.values_mut() {
            if *slot == at {
                *slot = to;
            } else if *slot != usize::MAX && *slot >= to && *slot < at {
                *slot += 1;
            }
        }
    }

    /// Appends the implicit descriptor entry and freezes slot numbering.
    pub(crate) fn seal(&mut self, descriptor: Arc<FileInner>, descriptor_path: InternId) {
        if !self.contains(descriptor_path) {
            self.entries.push(ImportEntry {
                file: descriptor,
                path: descriptor_path,
                original: String::new(),
                kind: None,
                decl: None,
                // Builtin options are resolvable without an explicit import.
                visible: true,
                reexport: false,
                used: true,
            });
        }

        self.by_path = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path, i as u32))
            .collect();
        self.visible = vec![0; (self.entries.len() + 63) / 64];
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.visible {
                self.visible[i / 64] |= 1 << (i % 64);
            }
        }
    }
}
