//! Scoped name lookup and reference resolution.
//!
//! Lookup climbs from the innermost scope outwards, editing one reusable
//! candidate buffer in place. A candidate that names an invisible or
//! wrong-kind symbol does not stop the climb; the first such failure is
//! remembered for diagnostics in case nothing better turns up. Names with
//! more than one component reproduce protoc's two-phase behaviour: settle a
//! scope for the first component, then look the full path up in one shot
//! and report the expected path on failure.

use crate::{
    ast::Span,
    error::{DiagnosticKind, Label, Report},
    ir::{
        build::{symtab, FileBuilder},
        FileInner, FileSlot, Scalar, Session, Symbol, SymbolKind, SymbolRef, TypeIndex,
        TypeKind, TypeRef,
    },
};

#[derive(Debug)]
pub(crate) enum ResolveError {
    NotFound,
    /// Found, but the symbol kind was rejected by the acceptance predicate.
    NotAccepted { fqn: String, sym: SymbolRef },
    /// Found in a file this file does not import.
    NotVisible { fqn: String, sym: SymbolRef },
    /// The first component settled on a scope but the full path is absent.
    Partial { expected: String },
}

pub(crate) struct Resolver<'a> {
    session: &'a Session,
    file: &'a FileInner,
    /// Import slots a successful resolution went through.
    pub(crate) used: Vec<FileSlot>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(session: &'a Session, file: &'a FileInner) -> Resolver<'a> {
        Resolver {
            session,
            file,
            used: Vec::new(),
        }
    }

    pub(crate) fn resolve(
        &mut self,
        name: &str,
        scope: &str,
        accept: &dyn Fn(SymbolKind) -> bool,
        allow_scalar: bool,
    ) -> Result<SymbolRef, ResolveError> {
        if let Some(absolute) = name.strip_prefix('.') {
            let mut err = ResolveError::NotFound;
            return match self.try_candidate(absolute, accept, &mut err) {
                Some(sym) => Ok(sym),
                None => Err(err),
            };
        }
        match name.find('.') {
            None => self.resolve_single(name, scope, accept, allow_scalar),
            Some(dot) => self.resolve_scoped(&name[..dot], &name[dot..], scope, accept),
        }
    }

    fn resolve_single(
        &mut self,
        name: &str,
        scope: &str,
        accept: &dyn Fn(SymbolKind) -> bool,
        allow_scalar: bool,
    ) -> Result<SymbolRef, ResolveError> {
        let mut err = ResolveError::NotFound;

        if !scope.is_empty() {
            let mut buf = format!("{}.{}", scope, name);
            if let Some(sym) = self.try_candidate(&buf, accept, &mut err) {
                return Ok(sym);
            }
            for (i, _) in scope.rmatch_indices('.') {
                buf.truncate(i + 1);
                buf.push_str(name);
                if let Some(sym) = self.try_candidate(&buf, accept, &mut err) {
                    return Ok(sym);
                }
            }
        }
        if let Some(sym) = self.try_candidate(name, accept, &mut err) {
            return Ok(sym);
        }

        if allow_scalar {
            if let Some(scalar) = Scalar::from_name(name) {
                return Ok(SymbolRef {
                    file: FileSlot::PREDECLARED,
                    symbol: Symbol {
                        kind: SymbolKind::Scalar,
                        index: scalar as u32,
                    },
                });
            }
        }
        Err(err)
    }

    fn resolve_scoped(
        &mut self,
        first: &str,
        rest: &str,
        scope: &str,
        accept: &dyn Fn(SymbolKind) -> bool,
    ) -> Result<SymbolRef, ResolveError> {
        // Stage one: any visible symbol settles the scope of the first
        // component.
        let mut err = ResolveError::NotFound;
        let any = |_: SymbolKind| true;

        let mut settled = None;
        if !scope.is_empty() {
            let mut buf = format!("{}.{}", scope, first);
            if self.try_candidate(&buf, &any, &mut err).is_some() {
                settled = Some(buf);
            } else {
                for (i, _) in scope.rmatch_indices('.') {
                    buf.truncate(i + 1);
                    buf.push_str(first);
                    if self.try_candidate(&buf, &any, &mut err).is_some() {
                        settled = Some(buf);
                        break;
                    }
                }
            }
        }
        if settled.is_none() && self.try_candidate(first, &any, &mut err).is_some() {
            settled = Some(first.to_owned());
        }

        let mut full = match settled {
            Some(settled) => settled,
            None => return Err(err),
        };
        full.push_str(rest);

        // Stage two: the full path resolves in one shot or not at all.
        match self.lookup(&full) {
            Some(sym) if !self.visible(sym) => Err(ResolveError::NotVisible { fqn: full, sym }),
            Some(sym) if !accept(sym.symbol.kind) => {
                Err(ResolveError::NotAccepted { fqn: full, sym })
            }
            Some(sym) => {
                self.mark_used(sym);
                Ok(sym)
            }
            None => Err(ResolveError::Partial { expected: full }),
        }
    }

    fn try_candidate(
        &mut self,
        fqn: &str,
        accept: &dyn Fn(SymbolKind) -> bool,
        err: &mut ResolveError,
    ) -> Option<SymbolRef> {
        let sym = self.lookup(fqn)?;
        if !self.visible(sym) {
            if matches!(err, ResolveError::NotFound) {
                *err = ResolveError::NotVisible {
                    fqn: fqn.to_owned(),
                    sym,
                };
            }
            return None;
        }
        if !accept(sym.symbol.kind) {
            if matches!(err, ResolveError::NotFound) {
                *err = ResolveError::NotAccepted {
                    fqn: fqn.to_owned(),
                    sym,
                };
            }
            return None;
        }
        self.mark_used(sym);
        Some(sym)
    }

    fn lookup(&self, fqn: &str) -> Option<SymbolRef> {
        let id = self.session.interner().probe(fqn)?;
        self.file.imported.lookup(id)
    }

    fn visible(&self, sym: SymbolRef) -> bool {
        match sym.file {
            FileSlot::LOCAL | FileSlot::PREDECLARED => true,
            slot => self.file.imports.is_visible(slot),
        }
    }

    fn mark_used(&mut self, sym: SymbolRef) {
        if sym.file != FileSlot::LOCAL && sym.file != FileSlot::PREDECLARED {
            self.used.push(sym.file);
        }
    }
}

fn accept_type(kind: SymbolKind) -> bool {
    kind.is_type()
}

fn accept_message(kind: SymbolKind) -> bool {
    kind == SymbolKind::Message
}

/// Resolves field element types, extendees and method signatures.
pub(crate) fn run(session: &Session, builder: &mut FileBuilder<'_>, report: &mut Report) {
    let mut member_types: Vec<(crate::ir::MemberIndex, Option<TypeRef>)> = Vec::new();
    let mut extendees: Vec<(crate::ir::ExtendIndex, Option<TypeRef>)> = Vec::new();
    let mut signatures: Vec<(crate::ir::MethodIndex, Option<TypeRef>, Option<TypeRef>)> =
        Vec::new();
    let mut used = Vec::new();

    {
        let file = &builder.file;
        let mut resolver = Resolver::new(session, file);

        for &(index, decl) in &builder.pending.fields {
            let member = file.member(index);
            let scope = scope_of(session, file, member.parent);
            let resolved = resolver.resolve(&decl.ty.name, &scope, &accept_type, true);
            let elem = match resolved {
                Ok(sym) => {
                    let elem = TypeRef {
                        file: sym.file,
                        index: TypeIndex(sym.symbol.index),
                    };
                    if member.is_map_key && !is_map_key_type(session, file, elem) {
                        report.push(DiagnosticKind::InvalidMapKeyType {
                            name: decl.ty.name.clone(),
                            found: Label::new("used here", &file.path, decl.ty.span),
                        });
                    }
                    Some(elem)
                }
                Err(err) => {
                    push_resolve_error(
                        session,
                        file,
                        report,
                        &decl.ty.name,
                        "a message or enum type",
                        decl.ty.span,
                        err,
                    );
                    None
                }
            };
            member_types.push((index, elem));
        }

        for &(index, decl) in &builder.pending.extends {
            let extend = &file.extends[index.index()];
            let scope = scope_of(session, file, extend.parent);
            let resolved =
                resolver.resolve(&decl.extendee.name, &scope, &accept_message, false);
            let extendee = match resolved {
                Ok(sym) => Some(TypeRef {
                    file: sym.file,
                    index: TypeIndex(sym.symbol.index),
                }),
                Err(err) => {
                    push_resolve_error(
                        session,
                        file,
                        report,
                        &decl.extendee.name,
                        "a message type",
                        decl.extendee.span,
                        err,
                    );
                    None
                }
            };
            extendees.push((index, extendee));
        }

        for &(index, decl) in &builder.pending.methods {
            let method = file.method(index);
            let scope = session.interner().get(file.service(method.parent).fqn);
            let mut signature = [None, None];
            for (slot, rpc) in [&decl.input, &decl.output].into_iter().enumerate() {
                match resolver.resolve(&rpc.ty.name, &scope, &accept_message, false) {
                    Ok(sym) => {
                        signature[slot] = Some(TypeRef {
                            file: sym.file,
                            index: TypeIndex(sym.symbol.index),
                        });
                    }
                    Err(err) => {
                        push_resolve_error(
                            session,
                            file,
                            report,
                            &rpc.ty.name,
                            "a message type",
                            rpc.ty.span,
                            err,
                        );
                    }
                }
            }
            signatures.push((index, signature[0], signature[1]));
        }

        used.extend(resolver.used);
    }

    for (index, elem) in member_types {
        let parent = builder.file.members[index.index()].parent;
        let member = &mut builder.file.members[index.index()];
        member.elem = elem;
        member.container = parent.map(TypeRef::local);
    }
    for (index, extendee) in extendees {
        let members = {
            let extend = &mut builder.file.extends[index.index()];
            extend.extendee = extendee;
            extend.members.clone()
        };
        for member in members {
            builder.file.members[member.index()].container = extendee;
        }
    }
    for (index, input, output) in signatures {
        let method = &mut builder.file.methods[index.index()];
        method.input = input;
        method.output = output;
    }
    for slot in used {
        builder.file.imports.entry_mut(slot).used = true;
    }
}

/// The scope a reference inside `parent` resolves from: the parent type's
/// fqn, or the package at file level.
pub(crate) fn scope_of(
    session: &Session,
    file: &FileInner,
    parent: Option<TypeIndex>,
) -> String {
    match parent {
        Some(parent) => session.interner().get(file.type_(parent).fqn).to_string(),
        None => session.interner().get(file.package).to_string(),
    }
}

fn is_map_key_type(session: &Session, file: &FileInner, elem: TypeRef) -> bool {
    let target = crate::ir::resolve_slot(session, file, elem.file);
    match target.get().type_(elem.index).kind {
        TypeKind::Scalar(scalar) => scalar.is_map_key(),
        // Messages cannot be keys, and neither can enums.
        TypeKind::Message | TypeKind::Enum => false,
    }
}

/// Converts a resolution failure into the matching diagnostic.
pub(crate) fn push_resolve_error(
    session: &Session,
    file: &FileInner,
    report: &mut Report,
    name: &str,
    expected: &str,
    span: Span,
    err: ResolveError,
) {
    let found = Label::new("referenced here", &file.path, span);
    match err {
        ResolveError::NotFound => report.push(DiagnosticKind::NameNotFound {
            name: name.to_owned(),
            found,
        }),
        ResolveError::NotAccepted { fqn, sym } => {
            let (path, def_span) = describe_symbol(session, file, sym);
            report.push(DiagnosticKind::InvalidType {
                name: fqn,
                expected: expected.to_owned(),
                found,
                defined: Label::new("defined here", &path, def_span),
            });
        }
        ResolveError::NotVisible { fqn, sym } => {
            let (path, _) = describe_symbol(session, file, sym);
            let mut help = format!("add `import \"{}\";` to bring it into scope", path);
            if sym.symbol.kind == SymbolKind::EnumValue {
                // Enum values live in the scope enclosing their enum, so the
                // name can land in a file the enum itself is not visible
                // from. This regularly surprises people; keep the
                // explanation.
                help.push_str(
                    "; note that enum values are named in the scope enclosing their enum, \
                     so this name is provided by the file that declares the enum",
                );
            }
            report.push(DiagnosticKind::NameNotVisible {
                name: fqn,
                providing_file: path,
                help: Some(help),
                found,
            });
        }
        ResolveError::Partial { expected } => {
            report.push(DiagnosticKind::PartialNameNotFound {
                name: name.to_owned(),
                expected,
                found,
            });
        }
    }
}

pub(crate) fn describe_symbol(
    session: &Session,
    file: &FileInner,
    sym: SymbolRef,
) -> (String, Span) {
    match sym.file {
        FileSlot::LOCAL => (file.path.clone(), symtab::symbol_span(file, sym.symbol)),
        FileSlot::PREDECLARED => (file.path.clone(), Span::default()),
        slot => {
            let target = file.file_for(session, slot);
            (target.path.clone(), symtab::symbol_span(&target, sym.symbol))
        }
    }
}
