//! Per-file symbol tables.
//!
//! Both tables are arrays of `(fqn, symbol ref)` sorted by the fqn's intern
//! id, so building the merged table of a file and its imports is an
//! `O(n + m)` merge and lookup is a binary search. The exported table is
//! what public importers see; the imported table is the whole universe of
//! names lowering may reference, including symbols from invisible files so
//! that "not imported" diagnostics can name the providing file.

use crate::{
    ast::Span,
    error::{DiagnosticKind, Label, Report},
    ir::{
        intern::{InternId, Interner},
        FileInner, FileSlot, Session, Symbol, SymbolKind, SymbolRef,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableEntry {
    pub(crate) fqn: InternId,
    pub(crate) sym: SymbolRef,
}

#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    entries: Vec<TableEntry>,
}

impl SymbolTable {
    pub(crate) fn from_sorted(entries: Vec<TableEntry>) -> SymbolTable {
        debug_assert!(entries.windows(2).all(|w| w[0].fqn <= w[1].fqn));
        SymbolTable { entries }
    }

    pub(crate) fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub(crate) fn lookup(&self, fqn: InternId) -> Option<SymbolRef> {
        self.entries
            .binary_search_by_key(&fqn, |entry| entry.fqn)
            .ok()
            .map(|i| self.entries[i].sym)
    }
}

/// Builds the exported and imported tables of a freshly walked file. The
/// import table must already be sealed.
pub(crate) fn build(session: &Session, file: &mut FileInner, report: &mut Report) {
    let local = local_symbols(session.interner(), file);

    let exported = {
        let sources: Vec<MergeSource<'_>> = file
            .imports
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_public_reexport())
            .map(|(i, entry)| MergeSource {
                table: &entry.file.exported,
                self_slot: FileSlot(i as u32),
                file: entry.file.as_ref(),
            })
            .collect();
        merge(session, file, local.clone(), &sources, None)
    };

    let imported = {
        let sources: Vec<MergeSource<'_>> = file
            .imports
            .entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| MergeSource {
                table: &entry.file.exported,
                self_slot: FileSlot(i as u32),
                file: entry.file.as_ref(),
            })
            .collect();
        merge(session, file, local, &sources, Some(report))
    };

    file.exported = exported;
    file.imported = imported;
}

/// Collects the symbols a file defines, unsorted.
pub(crate) fn local_symbols(interner: &Interner, file: &FileInner) -> Vec<TableEntry> {
    let mut entries = Vec::new();
    let mut push = |fqn: InternId, kind: SymbolKind, index: u32| {
        entries.push(TableEntry {
            fqn,
            sym: SymbolRef {
                file: FileSlot::LOCAL,
                symbol: Symbol { kind, index },
            },
        });
    };

    if file.package != InternId::EMPTY {
        let package = interner.get(file.package);
        for (i, _) in package.match_indices('.') {
            push(interner.intern(&package[..i]), SymbolKind::Package, 0);
        }
        push(file.package, SymbolKind::Package, 0);
    }

    for (i, ty) in file.types.iter().enumerate() {
        let kind = if ty.is_enum() {
            SymbolKind::Enum
        } else {
            SymbolKind::Message
        };
        push(ty.fqn, kind, i as u32);
    }
    for (i, member) in file.members.iter().enumerate() {
        let kind = if member.is_extension {
            SymbolKind::Extension
        } else if member.parent.map_or(false, |p| file.type_(p).is_enum()) {
            SymbolKind::EnumValue
        } else {
            SymbolKind::Field
        };
        push(member.fqn, kind, i as u32);
    }
    for (i, oneof) in file.oneofs.iter().enumerate() {
        push(oneof.fqn, SymbolKind::Oneof, i as u32);
    }
    for (i, service) in file.services.iter().enumerate() {
        push(service.fqn, SymbolKind::Service, i as u32);
    }
    for (i, method) in file.methods.iter().enumerate() {
        push(method.fqn, SymbolKind::Method, i as u32);
    }

    entries
}

/// One input to a table merge: a source table plus the rewrite of its file
/// slots into the destination file's numbering.
pub(crate) struct MergeSource<'a> {
    pub(crate) table: &'a SymbolTable,
    /// The slot of the source file itself in the destination's table.
    pub(crate) self_slot: FileSlot,
    pub(crate) file: &'a FileInner,
}

/// Merges pre-sorted symbol runs into one table, deduplicating by fqn.
///
/// Duplicate fqns produce one diagnostic per collision; the survivor is
/// chosen deterministically: packages win, then the lexically smaller file
/// path, then the earlier definition offset. Packages colliding with
/// packages, identical underlying symbols arriving over two import paths,
/// and group message/field pairs collapse silently.
pub(crate) fn merge(
    session: &Session,
    dest: &FileInner,
    mut local: Vec<TableEntry>,
    sources: &[MergeSource<'_>],
    report: Option<&mut Report>,
) -> SymbolTable {
    local.sort_by_key(|entry| entry.fqn);
    let mut merged = local;

    for source in sources {
        let rewritten = rewrite(dest, source);
        merged = merge_sorted(merged, rewritten);
    }

    dedup(session, dest, merged, report)
}

fn rewrite(dest: &FileInner, source: &MergeSource<'_>) -> Vec<TableEntry> {
    source
        .table
        .entries()
        .iter()
        .filter_map(|entry| {
            let file = match entry.sym.file {
                FileSlot::LOCAL => source.self_slot,
                FileSlot::PREDECLARED => FileSlot::PREDECLARED,
                slot => {
                    let path = source.file.imports.entry(slot).path;
                    // A file outside the destination's closure (a weak
                    // import's re-exports) contributes nothing.
                    match dest.imports.slot_of(path) {
                        Some(slot) => slot,
                        None => return None,
                    }
                }
            };
            Some(TableEntry {
                fqn: entry.fqn,
                sym: SymbolRef {
                    file,
                    symbol: entry.sym.symbol,
                },
            })
        })
        .collect()
}

fn merge_sorted(a: Vec<TableEntry>, b: Vec<TableEntry>) -> Vec<TableEntry> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].fqn <= b[j].fqn {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn dedup(
    session: &Session,
    dest: &FileInner,
    merged: Vec<TableEntry>,
    mut report: Option<&mut Report>,
) -> SymbolTable {
    let mut out: Vec<TableEntry> = Vec::with_capacity(merged.len());
    for entry in merged {
        let last = match out.last_mut() {
            Some(last) if last.fqn == entry.fqn => last,
            _ => {
                out.push(entry);
                continue;
            }
        };

        let keep_first = survives(session, dest, last, &entry);
        let (survivor, loser) = if keep_first {
            (*last, entry)
        } else {
            let displaced = *last;
            *last = entry;
            (entry, displaced)
        };

        if silent_collision(session, dest, &survivor, &loser) {
            continue;
        }
        if let Some(report) = report.as_deref_mut() {
            let name = session.interner().get(survivor.fqn);
            let (first_path, first_span) = describe(session, dest, &survivor);
            let (second_path, second_span) = describe(session, dest, &loser);
            report.push(DiagnosticKind::DuplicateName {
                name: name.to_string(),
                first: Label::new("first defined here", &first_path, first_span),
                second: Label::new("defined again here", &second_path, second_span),
            });
        }
    }
    SymbolTable::from_sorted(out)
}

/// Whether `a` survives over `b` under the deterministic precedence.
fn survives(session: &Session, dest: &FileInner, a: &TableEntry, b: &TableEntry) -> bool {
    let a_package = a.sym.symbol.kind == SymbolKind::Package;
    let b_package = b.sym.symbol.kind == SymbolKind::Package;
    if a_package != b_package {
        return a_package;
    }
    let (a_path, a_span) = describe(session, dest, a);
    let (b_path, b_span) = describe(session, dest, b);
    // Paths compare as strings: intern ids are assignment-order dependent.
    match a_path.cmp(&b_path) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => a_span.start.offset <= b_span.start.offset,
    }
}

fn silent_collision(
    session: &Session,
    dest: &FileInner,
    a: &TableEntry,
    b: &TableEntry,
) -> bool {
    // Packages legitimately span files.
    if a.sym.symbol.kind == SymbolKind::Package && b.sym.symbol.kind == SymbolKind::Package {
        return true;
    }
    // A synthetic map-entry message may share its name with a declared
    // type.
    if is_map_entry(session, dest, a) || is_map_entry(session, dest, b) {
        return true;
    }
    let same_file = path_of(session, dest, a.sym.file) == path_of(session, dest, b.sym.file);
    // The same definition can arrive over two import paths.
    if a.sym.symbol == b.sym.symbol && same_file {
        return true;
    }
    // A group declares a message and a field in one stroke.
    let kinds = (a.sym.symbol.kind, b.sym.symbol.kind);
    matches!(
        kinds,
        (SymbolKind::Message, SymbolKind::Field) | (SymbolKind::Field, SymbolKind::Message)
    ) && same_file
}

/// Whether the symbol names a message the map-field lowering synthesized:
/// entry types are the only messages whose fields carry the map-key flag.
fn is_map_entry(session: &Session, dest: &FileInner, entry: &TableEntry) -> bool {
    if entry.sym.symbol.kind != SymbolKind::Message {
        return false;
    }
    let in_file = |file: &FileInner| {
        let ty = &file.types[entry.sym.symbol.index as usize];
        ty.fields()
            .iter()
            .any(|&member| file.member(member).is_map_key)
    };
    match entry.sym.file {
        FileSlot::LOCAL => in_file(dest),
        slot => in_file(&dest.file_for(session, slot)),
    }
}

fn path_of(session: &Session, dest: &FileInner, slot: FileSlot) -> String {
    match slot {
        FileSlot::LOCAL => dest.path.clone(),
        _ => dest.file_for(session, slot).path.clone(),
    }
}

fn describe(session: &Session, dest: &FileInner, entry: &TableEntry) -> (String, Span) {
    match entry.sym.file {
        FileSlot::LOCAL => (dest.path.clone(), symbol_span(dest, entry.sym.symbol)),
        slot => {
            let file = dest.file_for(session, slot);
            (file.path.clone(), symbol_span(&file, entry.sym.symbol))
        }
    }
}

pub(crate) fn symbol_span(file: &FileInner, symbol: Symbol) -> Span {
    let i = symbol.index as usize;
    match symbol.kind {
        SymbolKind::Package => file.package_ast.map(|ast| ast.span).unwrap_or_default(),
        SymbolKind::Scalar => Span::default(),
        SymbolKind::Message | SymbolKind::Enum => file.types[i].ast.span,
        SymbolKind::Field | SymbolKind::EnumValue | SymbolKind::Extension => {
            file.members[i].ast.span
        }
        SymbolKind::Oneof => file.oneofs[i].ast.span,
        SymbolKind::Service => file.services[i].ast.span,
        SymbolKind::Method => file.methods[i].ast.span,
    }
}
