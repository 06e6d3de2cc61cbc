//! Option path resolution and value evaluation.
//!
//! An option is a path from a root options message down to a leaf
//! assignment. Identifier components look fields up by name in the current
//! message; parenthesized components resolve extension fields of it. Only
//! the final component may address a non-message or repeated field, a
//! non-repeated field may be set once per target entity, and two arms of
//! one oneof collide. `default` and `json_name` never enter the value tree.

use std::collections::HashMap;

use crate::{
    ast::{self, Span},
    error::{DiagnosticKind, Label, Report},
    ir::{
        build::{resolve, FileBuilder, OptionSubject},
        builtin,
        intern::InternId,
        resolve_slot,
        value::{AnyValue, MessageValue, SliceIndex, Value},
        FileInner, FileSlot, MemberIndex, MemberRef, MessageValueIndex, OptionTarget, Scalar,
        Session, SymbolKind, TypeIndex, TypeKind, TypeRef, ValueIndex,
    },
};

/// The value arenas, detached from the file while this pass appends to
/// them.
#[derive(Default)]
struct ValueArenas {
    values: Vec<Value>,
    message_values: Vec<MessageValue>,
    slices: Vec<Vec<u64>>,
}

impl ValueArenas {
    fn new_message_value(&mut self) -> MessageValueIndex {
        let index = MessageValueIndex(self.message_values.len() as u32);
        self.message_values.push(MessageValue::default());
        index
    }

    fn mv(&self, index: MessageValueIndex) -> &MessageValue {
        &self.message_values[index.index()]
    }

    fn mv_mut(&mut self, index: MessageValueIndex) -> &mut MessageValue {
        &mut self.message_values[index.index()]
    }

    fn value(&self, index: ValueIndex) -> &Value {
        &self.values[index.index()]
    }

    fn value_mut(&mut self, index: ValueIndex) -> &mut Value {
        &mut self.values[index.index()]
    }

    fn insert(
        &mut self,
        mv: MessageValueIndex,
        key: InternId,
        mut value: Value,
    ) -> ValueIndex {
        value.container = Some(mv);
        let index = ValueIndex(self.values.len() as u32);
        self.values.push(value);
        let message = self.mv_mut(mv);
        message.values.push(index);
        message.by_name.insert(key, index);
        index
    }
}

pub(crate) fn run(session: &Session, builder: &mut FileBuilder<'_>, report: &mut Report) {
    let pending = std::mem::take(&mut builder.pending.options);

    let mut pass = Pass {
        session,
        file: &builder.file,
        report,
        arenas: ValueArenas::default(),
        roots: HashMap::new(),
        pseudo_defaults: Vec::new(),
        pseudo_json_names: Vec::new(),
        used: Vec::new(),
        descriptor_slot: builder
            .file
            .imports
            .slot_of(session.interner().intern(builtin::DESCRIPTOR_PATH)),
    };

    for (subject, decl) in &pending {
        pass.option_decl(*subject, decl);
    }

    let Pass {
        arenas,
        roots,
        pseudo_defaults,
        pseudo_json_names,
        used,
        ..
    } = pass;

    builder.file.values = arenas.values;
    builder.file.message_values = arenas.message_values;
    builder.file.value_slices = arenas.slices;
    for (subject, mv) in roots {
        // A root that only saw failed assignments stays off the entity.
        let message = builder.file.message_value(mv);
        if message.values.is_empty() && message.any.is_none() {
            continue;
        }
        *builder.options_slot(subject) = Some(mv);
    }
    for (member, value) in pseudo_defaults {
        builder.file.members[member.index()].pseudo.default_value = Some(value);
    }
    for (member, name, span) in pseudo_json_names {
        builder.file.members[member.index()].pseudo.json_name = Some((name, span));
    }
    for slot in used {
        builder.file.imports.entry_mut(slot).used = true;
    }

    apply_flags(session, &mut builder.file);
}

struct Pass<'a, 'r> {
    session: &'a Session,
    file: &'a FileInner,
    report: &'r mut Report,
    arenas: ValueArenas,
    roots: HashMap<OptionSubject, MessageValueIndex>,
    pseudo_defaults: Vec<(MemberIndex, ValueIndex)>,
    pseudo_json_names: Vec<(MemberIndex, InternId, Span)>,
    used: Vec<FileSlot>,
    descriptor_slot: Option<FileSlot>,
}

/// Everything later steps need to know about a resolved option field.
#[derive(Clone)]
struct FieldInfo {
    member: MemberRef,
    /// Element type rebased into this file's slot numbering.
    elem: Option<TypeRef>,
    repeated: bool,
    is_group: bool,
    fqn: InternId,
    /// Conflict key: the oneof's fqn when the field is a oneof arm.
    key: InternId,
    /// Defined in the builtin descriptor file.
    builtin: bool,
    name: String,
}

impl<'a, 'r> Pass<'a, 'r> {
    fn option_decl(&mut self, subject: OptionSubject, decl: &ast::OptionDecl) {
        let root_ty = match self.root_type(subject) {
            Some(root_ty) => root_ty,
            None => return,
        };

        if self.pseudo_option(subject, decl) {
            return;
        }

        let root_mv = match self.roots.get(&subject) {
            Some(&mv) => mv,
            None => {
                let mv = self.arenas.new_message_value();
                self.roots.insert(subject, mv);
                mv
            }
        };

        let scope = self.subject_scope(subject);
        let mut cur_ty = root_ty;
        let mut cur_mv = root_mv;

        for (i, component) in decl.path.iter().enumerate() {
            let is_last = i + 1 == decl.path.len();
            let info = match self.path_component(component, cur_ty, &scope) {
                Some(info) => info,
                None => return,
            };
            if self.forbidden(&info, component.span()) {
                return;
            }

            if is_last {
                self.assign(cur_mv, &info, &decl.value, decl.span, component.span());
                return;
            }

            match self.descend(cur_mv, &info, decl.span, component.span()) {
                Some((mv, ty)) => {
                    cur_mv = mv;
                    cur_ty = ty;
                }
                None => return,
            }
        }
    }

    /// Diverts `default` and `json_name` on field options; returns whether
    /// the declaration was consumed.
    fn pseudo_option(&mut self, subject: OptionSubject, decl: &ast::OptionDecl) -> bool {
        let member_index = match subject {
            OptionSubject::Member(index) => index,
            _ => return false,
        };
        let member = self.file.member(member_index);
        let enum_value = member
            .parent
            .map_or(false, |parent| self.file.type_(parent).is_enum());
        if enum_value {
            return false;
        }
        let name = match decl.path.first() {
            Some(ast::OptionNamePart::Ident(ident))
                if ident.text == "default" || ident.text == "json_name" =>
            {
                ident.text.clone()
            }
            _ => return false,
        };
        if decl.path.len() > 1 {
            self.report.push(DiagnosticKind::OptionPseudoWithSuffix {
                name,
                found: Label::new("set here", &self.file.path, decl.span),
            });
            return true;
        }

        if name == "json_name" {
            match &decl.value {
                ast::OptionValue::Str(lit) => match lit.as_str() {
                    Some(text) => {
                        if let Some((_, first_span)) = self
                            .pseudo_json_names
                            .iter()
                            .find(|(index, _, _)| *index == member_index)
                            .map(|(_, id, span)| (*id, *span))
                        {
                            self.report.push(DiagnosticKind::OptionSetMultipleTimes {
                                name,
                                first: Label::new("first set here", &self.file.path, first_span),
                                second: Label::new("set again here", &self.file.path, decl.span),
                            });
                            return true;
                        }
                        let id = self.session.interner().intern(text);
                        self.pseudo_json_names.push((member_index, id, decl.span));
                    }
                    None => self.type_mismatch("a string", "invalid UTF-8", decl.value.span()),
                },
                other => self.type_mismatch("a string", describe_value(other), other.span()),
            }
            return true;
        }

        // default
        if let Some(&(_, first)) = self
            .pseudo_defaults
            .iter()
            .find(|(index, _)| *index == member_index)
        {
            let first_span = self.arenas.value(first).first_set_at();
            self.report.push(DiagnosticKind::OptionSetMultipleTimes {
                name,
                first: Label::new("first set here", &self.file.path, first_span),
                second: Label::new("set again here", &self.file.path, decl.span),
            });
            return true;
        }
        let elem = match member.elem {
            Some(elem) => elem,
            None => return true,
        };
        let member_ref = MemberRef {
            file: FileSlot::LOCAL,
            index: member_index,
        };
        if let Ok(bits) = self.single(elem, &decl.value) {
            let value = Value::new(member_ref, bits, decl.value.span(), decl.span, 1);
            let index = ValueIndex(self.arenas.values.len() as u32);
            self.arenas.values.push(value);
            self.pseudo_defaults.push((member_index, index));
        }
        true
    }

    /// Resolves one path component to an option field of `cur_ty`.
    fn path_component(
        &mut self,
        component: &ast::OptionNamePart,
        cur_ty: TypeRef,
        scope: &str,
    ) -> Option<FieldInfo> {
        match component {
            ast::OptionNamePart::Ident(ident) => {
                let target = resolve_slot(self.session, self.file, cur_ty.file);
                let name_id = self.session.interner().probe(&ident.text);
                let found = name_id
                    .and_then(|id| target.get().member_by_name(cur_ty.index, id));
                match found {
                    Some(index) => {
                        self.field_info(
                            MemberRef {
                                file: cur_ty.file,
                                index,
                            },
                            &ident.text,
                        )
                    }
                    None => {
                        self.report.push(DiagnosticKind::OptionNotFound {
                            name: ident.text.clone(),
                            found: Label::new("named here", &self.file.path, ident.span),
                        });
                        None
                    }
                }
            }
            ast::OptionNamePart::Extension(name) => {
                self.extension_component(name, cur_ty, scope)
            }
        }
    }

    fn extension_component(
        &mut self,
        name: &ast::TypeName,
        cur_ty: TypeRef,
        scope: &str,
    ) -> Option<FieldInfo> {
        let mut resolver = resolve::Resolver::new(self.session, self.file);
        let accept = |kind: SymbolKind| kind == SymbolKind::Extension;
        let result = resolver.resolve(&name.name, scope, &accept, false);
        self.used.extend(resolver.used);

        let sym = match result {
            Ok(sym) => sym,
            Err(err) => {
                resolve::push_resolve_error(
                    self.session,
                    self.file,
                    self.report,
                    &name.name,
                    "an extension",
                    name.span,
                    err,
                );
                return None;
            }
        };
        let member = MemberRef {
            file: sym.file,
            index: MemberIndex(sym.symbol.index),
        };
        let info = self.field_info(member, &name.name)?;

        // The extension must extend the message the path has descended to.
        let member_file = resolve_slot(self.session, self.file, member.file);
        let container = member_file.get().member(member.index).container;
        let extends_cur = container
            .and_then(|c| self.rebase(member.file, member_file.get(), c))
            .map_or(false, |c| self.same_type(c, cur_ty));
        if !extends_cur {
            let expected_fqn = self.type_fqn(cur_ty);
            let (path, span) =
                resolve::describe_symbol(self.session, self.file, sym);
            self.report.push(DiagnosticKind::InvalidType {
                name: name.name.clone(),
                expected: format!("an extension of {}", expected_fqn),
                found: Label::new("named here", &self.file.path, name.span),
                defined: Label::new("defined here", &path, span),
            });
            return None;
        }
        Some(info)
    }

    fn field_info(&mut self, member: MemberRef, name: &str) -> Option<FieldInfo> {
        let member_file = resolve_slot(self.session, self.file, member.file);
        let raw = member_file.get().member(member.index);
        let elem = raw
            .elem
            .and_then(|elem| self.rebase(member.file, member_file.get(), elem));
        let key = match raw.oneof_index() {
            Some(oneof) => member_file.get().oneof(oneof).fqn,
            None => raw.fqn,
        };
        Some(FieldInfo {
            member,
            elem,
            repeated: raw.is_repeated(),
            is_group: raw.is_group,
            fqn: raw.fqn,
            key,
            builtin: member_file.get().is_descriptor(),
            name: name.to_owned(),
        })
    }

    /// Rebases a type reference from `from`'s slot numbering into this
    /// file's numbering.
    fn rebase(
        &self,
        member_slot: FileSlot,
        from: &FileInner,
        r: TypeRef,
    ) -> Option<TypeRef> {
        match r.file {
            FileSlot::LOCAL => Some(TypeRef {
                file: member_slot,
                index: r.index,
            }),
            FileSlot::PREDECLARED => Some(r),
            slot => {
                let path = from.imports.entry(slot).path;
                self.file.imports.slot_of(path).map(|file| TypeRef {
                    file,
                    index: r.index,
                })
            }
        }
    }

    fn same_type(&self, a: TypeRef, b: TypeRef) -> bool {
        if a == b {
            return true;
        }
        if a.index != b.index {
            return false;
        }
        let a_file = resolve_slot(self.session, self.file, a.file);
        let b_file = resolve_slot(self.session, self.file, b.file);
        a_file.get().path == b_file.get().path
    }

    fn type_fqn(&self, ty: TypeRef) -> String {
        let file = resolve_slot(self.session, self.file, ty.file);
        self.session
            .interner()
            .get(file.get().type_(ty.index).fqn)
            .to_string()
    }

    /// Names that may never be set explicitly. Only applies to fields of the
    /// builtin options messages.
    fn forbidden(&mut self, info: &FieldInfo, span: Span) -> bool {
        if !info.builtin {
            return false;
        }
        let found = Label::new("set here", &self.file.path, span);
        let kind = match info.name.as_str() {
            "uninterpreted_option" => DiagnosticKind::OptionUninterpretedForbidden { found },
            "map_entry" => DiagnosticKind::OptionMapEntryForbidden { found },
            "packed" if self.file.syntax.is_editions() => {
                DiagnosticKind::OptionPackedForbidden { found }
            }
            "features" if !self.file.syntax.is_editions() => {
                DiagnosticKind::OptionFeaturesForbidden { found }
            }
            _ => return false,
        };
        self.report.push(kind);
        true
    }

    /// Steps into an intermediate path component, which must be a singular
    /// message field.
    fn descend(
        &mut self,
        mv: MessageValueIndex,
        info: &FieldInfo,
        decl_span: Span,
        component_span: Span,
    ) -> Option<(MessageValueIndex, TypeRef)> {
        let elem = info.elem?;
        let is_message = {
            let target = resolve_slot(self.session, self.file, elem.file);
            target.get().type_(elem.index).is_message()
        };
        if info.repeated || !is_message {
            self.report.push(DiagnosticKind::OptionMustBeMessage {
                name: info.name.clone(),
                found: Label::new("named here", &self.file.path, component_span),
            });
            return None;
        }

        if let Some(&existing) = self.arenas.mv(mv).by_name.get(&info.key) {
            let value = self.arenas.value(existing);
            if value.member() != info.member {
                self.conflict(info, value.first_set_at(), decl_span);
                return None;
            }
            let child = MessageValueIndex(value.bits() as u32);
            return Some((child, elem));
        }

        let child = self.arenas.new_message_value();
        let value = Value::new(
            info.member,
            child.0 as u64,
            decl_span,
            component_span,
            1,
        );
        self.arenas.insert(mv, info.key, value);
        Some((child, elem))
    }

    /// Evaluates and installs a leaf assignment.
    fn assign(
        &mut self,
        mv: MessageValueIndex,
        info: &FieldInfo,
        value: &ast::OptionValue,
        decl_span: Span,
        path_span: Span,
    ) {
        let elem = match info.elem {
            Some(elem) => elem,
            None => return,
        };

        if info.repeated {
            let elems = self.elements(elem, value);
            match self.arenas.mv(mv).by_name.get(&info.key).copied() {
                Some(existing) => {
                    let appended = elems.len() as u32;
                    // Spill the single inline element before appending.
                    let slice = match self.arenas.value(existing).slice_index() {
                        Some(slice) => slice,
                        None => {
                            let bits = self.arenas.value(existing).bits();
                            let slice = SliceIndex(self.arenas.slices.len() as u32);
                            self.arenas.slices.push(vec![bits]);
                            self.arenas.value_mut(existing).set_slice(slice);
                            slice
                        }
                    };
                    self.arenas.slices[slice.0 as usize].extend(elems);
                    self.arenas
                        .value_mut(existing)
                        .push_expr(value.span(), path_span, appended);
                }
                None => {
                    let mut new = Value::new(
                        info.member,
                        0,
                        value.span(),
                        path_span,
                        elems.len() as u32,
                    );
                    if elems.len() == 1 {
                        new.set_single(elems[0]);
                    } else {
                        let slice = SliceIndex(self.arenas.slices.len() as u32);
                        self.arenas.slices.push(elems);
                        new.set_slice(slice);
                    }
                    self.arenas.insert(mv, info.key, new);
                }
            }
            return;
        }

        if let Some(&existing) = self.arenas.mv(mv).by_name.get(&info.key) {
            let first = self.arenas.value(existing).first_set_at();
            self.conflict(info, first, decl_span);
            return;
        }
        if let Ok(bits) = self.single(elem, value) {
            let new = Value::new(info.member, bits, value.span(), path_span, 1);
            self.arenas.insert(mv, info.key, new);
        }
    }

    fn conflict(&mut self, info: &FieldInfo, first: Span, second: Span) {
        self.report.push(DiagnosticKind::OptionSetMultipleTimes {
            name: self.session.interner().get(info.fqn).to_string(),
            first: Label::new("first set here", &self.file.path, first),
            second: Label::new("set again here", &self.file.path, second),
        });
    }

    /// The elements a RHS expression contributes to a repeated field.
    fn elements(&mut self, elem: TypeRef, value: &ast::OptionValue) -> Vec<u64> {
        match value {
            ast::OptionValue::List(list) => list
                .elems
                .iter()
                .filter_map(|element| match element {
                    ast::OptionValue::List(nested) => {
                        self.type_mismatch("an element", "a nested list", nested.span);
                        None
                    }
                    other => self.single(elem, other).ok(),
                })
                .collect(),
            other => self.single(elem, other).ok().into_iter().collect(),
        }
    }

    /// Evaluates a single value against the element type; the error case
    /// has already been reported.
    fn single(&mut self, elem: TypeRef, value: &ast::OptionValue) -> Result<u64, ()> {
        let (kind, enum_ty) = {
            let target = resolve_slot(self.session, self.file, elem.file);
            let raw = target.get().type_(elem.index);
            (raw.kind, raw.fqn)
        };
        match kind {
            TypeKind::Scalar(scalar) => self.scalar(scalar, value),
            TypeKind::Enum => self.enum_value(elem, enum_ty, value),
            TypeKind::Message => match value {
                ast::OptionValue::Message(lit) => {
                    let mv = self.message_literal(elem, lit);
                    Ok(mv.0 as u64)
                }
                other => {
                    let expected = format!("a {} message literal", self.type_fqn(elem));
                    self.type_mismatch(&expected, describe_value(other), other.span());
                    Err(())
                }
            },
        }
    }

    fn scalar(&mut self, scalar: Scalar, value: &ast::OptionValue) -> Result<u64, ()> {
        use ast::OptionValue as V;
        let span = value.span();
        match scalar {
            Scalar::Int32 | Scalar::Sfixed32 | Scalar::Sint32 => {
                self.int(value, i32::MIN as i64, i32::MAX as i64, "int32")
            }
            Scalar::Int64 | Scalar::Sfixed64 | Scalar::Sint64 => {
                self.int(value, i64::MIN, i64::MAX, "int64")
            }
            Scalar::Uint32 | Scalar::Fixed32 => self.uint(value, u32::MAX as u64, "uint32"),
            Scalar::Uint64 | Scalar::Fixed64 => self.uint(value, u64::MAX, "uint64"),
            Scalar::Double | Scalar::Float => match value {
                V::Float(lit) => {
                    let magnitude = lit.value;
                    let signed = if lit.negative { -magnitude } else { magnitude };
                    Ok(signed.to_bits())
                }
                V::Int(lit) => {
                    let magnitude = lit.value as f64;
                    let signed = if lit.negative { -magnitude } else { magnitude };
                    Ok(signed.to_bits())
                }
                V::Ident(ident) if ident.text == "inf" => Ok(f64::INFINITY.to_bits()),
                V::Ident(ident) if ident.text == "nan" => Ok(f64::NAN.to_bits()),
                other => {
                    self.type_mismatch("a number", describe_value(other), span);
                    Err(())
                }
            },
            Scalar::Bool => match value {
                V::Ident(ident) if ident.text == "true" => Ok(1),
                V::Ident(ident) if ident.text == "false" => Ok(0),
                other => {
                    self.type_mismatch("true or false", describe_value(other), span);
                    Err(())
                }
            },
            Scalar::String => match value {
                V::Str(lit) => match lit.as_str() {
                    Some(text) => Ok(self.session.interner().intern(text).to_raw() as u64),
                    None => {
                        self.type_mismatch("a string", "invalid UTF-8", span);
                        Err(())
                    }
                },
                other => {
                    self.type_mismatch("a string", describe_value(other), span);
                    Err(())
                }
            },
            Scalar::Bytes => match value {
                V::Str(lit) => {
                    Ok(self.session.interner().intern_bytes(&lit.value).to_raw() as u64)
                }
                other => {
                    self.type_mismatch("a bytes literal", describe_value(other), span);
                    Err(())
                }
            },
        }
    }

    fn int(
        &mut self,
        value: &ast::OptionValue,
        min: i64,
        max: i64,
        ty: &'static str,
    ) -> Result<u64, ()> {
        match value {
            ast::OptionValue::Int(lit) => match lit.as_i64() {
                Some(v) if v >= min && v <= max => Ok(v as u64),
                _ => {
                    self.out_of_range(lit, ty);
                    Err(())
                }
            },
            other => {
                self.type_mismatch("an integer", describe_value(other), other.span());
                Err(())
            }
        }
    }

    fn uint(&mut self, value: &ast::OptionValue, max: u64, ty: &'static str) -> Result<u64, ()> {
        match value {
            ast::OptionValue::Int(lit) => match lit.as_u64() {
                Some(v) if v <= max => Ok(v),
                _ => {
                    self.out_of_range(lit, ty);
                    Err(())
                }
            },
            other => {
                self.type_mismatch("an integer", describe_value(other), other.span());
                Err(())
            }
        }
    }

    fn out_of_range(&mut self, lit: &ast::IntLit, ty: &'static str) {
        let rendered = if lit.negative {
            format!("-{}", lit.value)
        } else {
            lit.value.to_string()
        };
        self.report.push(DiagnosticKind::IntegerOutOfRange {
            value: rendered,
            ty,
            found: Label::new("set here", &self.file.path, lit.span),
        });
    }

    /// Enum names resolve in the scope of the enum's declaration.
    fn enum_value(
        &mut self,
        elem: TypeRef,
        enum_fqn: InternId,
        value: &ast::OptionValue,
    ) -> Result<u64, ()> {
        let ident = match value {
            ast::OptionValue::Ident(ident) => ident,
            other => {
                let expected = format!("a value of enum {}", self.session.interner().get(enum_fqn));
                self.type_mismatch(&expected, describe_value(other), other.span());
                return Err(());
            }
        };
        let target = resolve_slot(self.session, self.file, elem.file);
        let name_id = self.session.interner().probe(&ident.text);
        let member =
            name_id.and_then(|id| target.get().member_by_name(elem.index, id));
        match member {
            Some(member) => Ok(target.get().member(member).number as i64 as u64),
            None => {
                self.report.push(DiagnosticKind::OptionEnumValueNotFound {
                    name: ident.text.clone(),
                    enum_name: self.session.interner().get(enum_fqn).to_string(),
                    found: Label::new("named here", &self.file.path, ident.span),
                });
                Err(())
            }
        }
    }

    /// Evaluates a message literal field-by-field, with the same conflict
    /// rules as top-level option paths.
    fn message_literal(&mut self, ty: TypeRef, lit: &ast::MessageLit) -> MessageValueIndex {
        let mv = self.arenas.new_message_value();

        if self.type_fqn(ty) == "google.protobuf.Any" {
            if let [field] = lit.fields.as_slice() {
                if let ast::MessageLitFieldName::AnyTypeUrl { prefix, name, .. } = &field.name {
                    self.any_literal(mv, prefix, name, &field.value);
                    return mv;
                }
            }
        }

        for field in &lit.fields {
            let info = match &field.name {
                ast::MessageLitFieldName::Ident(ident) => {
                    let target = resolve_slot(self.session, self.file, ty.file);
                    let found = self
                        .session
                        .interner()
                        .probe(&ident.text)
                        .and_then(|id| target.get().member_by_name(ty.index, id));
                    match found {
                        Some(index) => self.field_info(
                            MemberRef {
                                file: ty.file,
                                index,
                            },
                            &ident.text,
                        ),
                        None => {
                            self.report.push(DiagnosticKind::OptionNotFound {
                                name: ident.text.clone(),
                                found: Label::new("named here", &self.file.path, ident.span),
                            });
                            None
                        }
                    }
                }
                ast::MessageLitFieldName::Extension(name) => {
                    let scope = self
                        .session
                        .interner()
                        .get(self.file.package)
                        .to_string();
                    self.extension_component(name, ty, &scope)
                }
                ast::MessageLitFieldName::AnyTypeUrl { span, .. } => {
                    self.type_mismatch(
                        "a field of the message",
                        "an Any type URL",
                        *span,
                    );
                    None
                }
            };
            let info = match info {
                Some(info) => info,
                None => continue,
            };
            let name_span = field.name.span();
            self.assign(mv, &info, &field.value, name_span, name_span);
        }
        mv
    }

    /// `{ [type.googleapis.com/foo.Bar] { ... } }` wraps a concrete message
    /// in an Any.
    fn any_literal(
        &mut self,
        mv: MessageValueIndex,
        prefix: &str,
        name: &ast::TypeName,
        value: &ast::OptionValue,
    ) {
        let mut resolver = resolve::Resolver::new(self.session, self.file);
        let accept = |kind: SymbolKind| kind == SymbolKind::Message;
        let absolute = format!(".{}", name.name.trim_start_matches('.'));
        let result = resolver.resolve(&absolute, "", &accept, false);
        self.used.extend(resolver.used);

        let sym = match result {
            Ok(sym) => sym,
            Err(err) => {
                resolve::push_resolve_error(
                    self.session,
                    self.file,
                    self.report,
                    &name.name,
                    "a message type",
                    name.span,
                    err,
                );
                return;
            }
        };
        let concrete_ty = TypeRef {
            file: sym.file,
            index: TypeIndex(sym.symbol.index),
        };
        let lit = match value {
            ast::OptionValue::Message(lit) => lit,
            other => {
                self.type_mismatch("a message literal", describe_value(other), other.span());
                return;
            }
        };
        let concrete = self.message_literal(concrete_ty, lit);
        let url = format!("{}/{}", prefix, name.name.trim_start_matches('.'));
        self.arenas.mv_mut(mv).any = Some(AnyValue {
            type_url: self.session.interner().intern(&url),
            concrete,
        });
    }

    fn type_mismatch(&mut self, expected: &str, found_value: &str, span: Span) {
        self.report.push(DiagnosticKind::OptionTypeMismatch {
            expected: expected.to_owned(),
            found_value: found_value.to_owned(),
            found: Label::new("set here", &self.file.path, span),
        });
    }

    fn subject_scope(&self, subject: OptionSubject) -> String {
        let interner = self.session.interner();
        let fqn = match subject {
            OptionSubject::File => self.file.package,
            OptionSubject::Type(index) => self.file.type_(index).fqn,
            OptionSubject::Member(index) => self.file.member(index).fqn,
            OptionSubject::Oneof(index) => self.file.oneof(index).fqn,
            OptionSubject::Range(index) => {
                self.file.type_(self.file.range(index).parent).fqn
            }
            OptionSubject::Service(index) => self.file.service(index).fqn,
            OptionSubject::Method(index) => self.file.method(index).fqn,
        };
        interner.get(fqn).to_string()
    }

    /// The root options message for the subject, inside the builtin
    /// descriptor file.
    fn root_type(&self, subject: OptionSubject) -> Option<TypeRef> {
        let name = match subject {
            OptionSubject::File => "FileOptions",
            OptionSubject::Type(index) => {
                if self.file.type_(index).is_enum() {
                    "EnumOptions"
                } else {
                    "MessageOptions"
                }
            }
            OptionSubject::Member(index) => {
                let member = self.file.member(index);
                let enum_value = member
                    .parent
                    .map_or(false, |parent| self.file.type_(parent).is_enum());
                if enum_value {
                    "EnumValueOptions"
                } else {
                    "FieldOptions"
                }
            }
            OptionSubject::Oneof(_) => "OneofOptions",
            OptionSubject::Range(_) => "ExtensionRangeOptions",
            OptionSubject::Service(_) => "ServiceOptions",
            OptionSubject::Method(_) => "MethodOptions",
        };
        let slot = self.descriptor_slot?;
        let descriptor = &self.session.shared.descriptor;
        let fqn = self
            .session
            .interner()
            .probe(&format!("google.protobuf.{}", name))?;
        descriptor
            .types
            .iter()
            .position(|ty| ty.fqn == fqn)
            .map(|i| TypeRef {
                file: slot,
                index: TypeIndex(i as u32),
            })
    }
}

fn describe_value(value: &ast::OptionValue) -> &'static str {
    match value {
        ast::OptionValue::Ident(_) => "an identifier",
        ast::OptionValue::Int(_) => "an integer",
        ast::OptionValue::Float(_) => "a floating-point number",
        ast::OptionValue::Str(_) => "a string",
        ast::OptionValue::List(_) => "a list",
        ast::OptionValue::Message(_) => "a message literal",
    }
}

/// Copies option-driven flags onto the entities: `deprecated` everywhere it
/// applies, and `FieldOptions.targets` for use by the target-constraint
/// check.
fn apply_flags(session: &Session, file: &mut FileInner) {
    let interner = session.interner();
    let deprecated_id = interner.intern("deprecated");
    let targets_id = interner.intern("targets");

    let read = |file: &FileInner,
                mv: MessageValueIndex,
                name: InternId|
     -> Option<(u64, Vec<u64>)> {
        let mv = file.message_value(mv);
        for &value_index in &mv.values {
            let value = file.value(value_index);
            let member = value.member();
            let member_file = resolve_slot(session, file, member.file);
            if !member_file.get().is_descriptor() {
                continue;
            }
            if member_file.get().member(member.index).name == name {
                return Some((value.bits(), file.value_elems(value)));
            }
        }
        None
    };

    for i in 0..file.types.len() {
        if let Some(mv) = file.types[i].options {
            if let Some((bits, _)) = read(file, mv, deprecated_id) {
                file.types[i].deprecated = bits != 0;
            }
        }
    }
    for i in 0..file.members.len() {
        if let Some(mv) = file.members[i].options {
            if let Some((bits, _)) = read(file, mv, deprecated_id) {
                file.members[i].deprecated = bits != 0;
            }
            if let Some((_, elems)) = read(file, mv, targets_id) {
                file.members[i].targets = elems
                    .iter()
                    .filter_map(|&bits| OptionTarget::from_number(bits as i64 as i32))
                    .collect();
            }
        }
    }
}
