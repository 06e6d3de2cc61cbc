//! First pass: translate the AST into the entity graph.
//!
//! The walker allocates types, members, oneofs, extend blocks, services and
//! ranges, records parent/child relations and composes fully-qualified
//! names. Name resolution and option interpretation are deferred; the
//! walker records the AST nodes those passes will need. Corrupt nodes are
//! skipped silently.

use crate::{
    ast::{self, AstRef, Label as AstLabel, Syntax},
    error::{DiagnosticKind, Label, Report},
    ir::{
        build::{FileBuilder, OptionSubject},
        intern::InternId,
        ExtendIndex, MemberIndex, MethodIndex, OneofIndex, Presence, RangeIndex, RawExtend,
        RawMember, RawMethod, RawOneof, RawRange, RawReservedName, RawService, RawType,
        ReservedNameIndex, ServiceIndex, Session, TypeIndex, TypeKind, TypeRef,
    },
};

pub(crate) fn walk<'ast>(
    session: &Session,
    builder: &mut FileBuilder<'ast>,
    ast: &'ast ast::SourceFile,
    report: &mut Report,
) {
    let scope = match builder.file.package {
        InternId::EMPTY => String::new(),
        id => session.interner().get(id).to_string(),
    };
    let mut walker = Walker {
        session,
        builder,
        report,
        scope,
    };

    for option in &ast.options {
        walker
            .builder
            .pending
            .options
            .push((OptionSubject::File, option));
    }
    for decl in &ast.decls {
        match decl {
            ast::Decl::Message(message) => walker.message(message, None),
            ast::Decl::Enum(enum_) => walker.enum_(enum_, None),
            ast::Decl::Extend(extend) => walker.extend(extend, None),
            ast::Decl::Service(service) => walker.service(service),
        }
    }
}

struct Walker<'b, 'ast> {
    session: &'b Session,
    builder: &'b mut FileBuilder<'ast>,
    report: &'b mut Report,
    scope: String,
}

impl<'b, 'ast> Walker<'b, 'ast> {
    fn message(&mut self, decl: &'ast ast::MessageDecl, parent: Option<TypeIndex>) {
        if decl.corrupt {
            return;
        }
        let index = self.alloc_type(
            &decl.name.text,
            TypeKind::Message,
            parent,
            AstRef::new(decl.span, decl.token),
        );
        self.push_scope(&decl.name.text);
        self.message_items(&decl.items, index);
        self.pop_scope(&decl.name.text);
    }

    fn message_items(&mut self, items: &'ast [ast::MessageItem], index: TypeIndex) {
        for item in items {
            match item {
                ast::MessageItem::Field(field) => self.field(field, Some(index), None, None),
                ast::MessageItem::Group(group) => self.group(group, Some(index), None, None),
                ast::MessageItem::Oneof(oneof) => self.oneof(oneof, index),
                ast::MessageItem::Message(message) => self.message(message, Some(index)),
                ast::MessageItem::Enum(enum_) => self.enum_(enum_, Some(index)),
                ast::MessageItem::Extend(extend) => self.extend(extend, Some(index)),
                ast::MessageItem::Extensions(extensions) => self.extensions(extensions, index),
                ast::MessageItem::Reserved(reserved) => self.reserved(reserved, index),
                ast::MessageItem::Option(option) => self
                    .builder
                    .pending
                    .options
                    .push((OptionSubject::Type(index), option)),
            }
        }
    }

    fn enum_(&mut self, decl: &'ast ast::EnumDecl, parent: Option<TypeIndex>) {
        if decl.corrupt {
            return;
        }
        let index = self.alloc_type(
            &decl.name.text,
            TypeKind::Enum,
            parent,
            AstRef::new(decl.span, decl.token),
        );
        // Enum values are scoped to the enum's parent, not the enum; the
        // scope stays where it is.
        for item in &decl.items {
            match item {
                ast::EnumItem::Value(value) => self.enum_value(value, index),
                ast::EnumItem::Reserved(reserved) => self.reserved(reserved, index),
                ast::EnumItem::Option(option) => {
                    if is_allow_alias(option) {
                        self.builder.file.types[index.index()].allow_alias = true;
                    }
                    self.builder
                        .pending
                        .options
                        .push((OptionSubject::Type(index), option));
                }
            }
        }
    }

    fn enum_value(&mut self, decl: &'ast ast::EnumValueDecl, enum_: TypeIndex) {
        if decl.corrupt {
            return;
        }
        let number = match decl.number.as_i64() {
            Some(number) if i32::try_from(number).is_ok() => number as i32,
            _ => {
                self.number_out_of_range(&decl.number);
                0
            }
        };
        let member = RawMember::new(
            AstRef::new(decl.span, decl.token),
            self.session.interner().intern(&decl.name.text),
            self.session.interner().intern(&self.qualify(&decl.name.text)),
            number,
            Some(enum_),
        );
        let index = MemberIndex(self.builder.file.members.len() as u32);
        self.builder.file.members.push(member);
        let ty = &mut self.builder.file.types[enum_.index()];
        ty.members.insert(ty.extns_start, index);
        ty.extns_start += 1;

        for option in &decl.options {
            self.builder
                .pending
                .options
                .push((OptionSubject::Member(index), option));
        }
    }

    fn field(
        &mut self,
        decl: &'ast ast::FieldDecl,
        parent: Option<TypeIndex>,
        oneof: Option<OneofIndex>,
        extend: Option<ExtendIndex>,
    ) {
        if decl.corrupt {
            return;
        }
        let index = self.alloc_member(
            &decl.name.text,
            &decl.number,
            decl.label,
            AstRef::new(decl.span, decl.token),
            parent,
            oneof,
            extend,
        );
        let member = &mut self.builder.file.members[index.index()];
        member.is_map_key = decl.is_map_key;
        self.builder.pending.fields.push((index, decl));
        for option in &decl.options {
            self.builder
                .pending
                .options
                .push((OptionSubject::Member(index), option));
        }
    }

    /// A group declares a nested message and a field whose name is the
    /// group name lowercased.
    fn group(
        &mut self,
        decl: &'ast ast::GroupDecl,
        parent: Option<TypeIndex>,
        oneof: Option<OneofIndex>,
        extend: Option<ExtendIndex>,
    ) {
        if decl.corrupt {
            return;
        }
        let ty = self.alloc_type(
            &decl.name.text,
            TypeKind::Message,
            parent,
            AstRef::new(decl.span, decl.token),
        );
        self.push_scope(&decl.name.text);
        self.message_items(&decl.items, ty);
        self.pop_scope(&decl.name.text);

        let field_name = decl.name.text.to_lowercase();
        let index = self.alloc_member(
            &field_name,
            &decl.number,
            decl.label,
            AstRef::new(decl.span, decl.token),
            parent,
            oneof,
            extend,
        );
        let member = &mut self.builder.file.members[index.index()];
        member.elem = Some(TypeRef::local(ty));
        member.is_group = true;
        for option in &decl.options {
            self.builder
                .pending
                .options
                .push((OptionSubject::Member(index), option));
        }
    }

    /// Allocates a member and installs it into its oneof, extend block or
    /// fields partition.
    #[allow(clippy::too_many_arguments)]
    fn alloc_member(
        &mut self,
        name: &str,
        number: &ast::IntLit,
        label: Option<ast::LabelDecl>,
        ast_ref: AstRef,
        parent: Option<TypeIndex>,
        oneof: Option<OneofIndex>,
        extend: Option<ExtendIndex>,
    ) -> MemberIndex {
        let number = self.field_number(number);
        if matches!(label.map(|l| l.label), Some(AstLabel::Required)) {
            if let Syntax::Edition(year) = self.builder.file.syntax {
                // Editions replaced `required` with features.field_presence.
                self.report.push(DiagnosticKind::EditionTooNew {
                    feature: "the required label".to_owned(),
                    edition: year.to_string(),
                    removed: "2023".to_owned(),
                    found: Label::new("declared here", &self.builder.file.path, ast_ref.span),
                });
            }
        }
        let mut member = RawMember::new(
            ast_ref,
            self.session.interner().intern(name),
            self.session.interner().intern(&self.qualify(name)),
            number,
            parent,
        );
        member.set_presence(self.presence_of(label));
        member.is_extension = extend.is_some();
        if let Some(oneof) = oneof {
            member.set_oneof(oneof);
        }

        let index = MemberIndex(self.builder.file.members.len() as u32);
        self.builder.file.members.push(member);

        if let Some(oneof) = oneof {
            self.builder.file.oneofs[oneof.index()].members.push(index);
        }
        if let Some(extend) = extend {
            self.builder.file.extends[extend.index()].members.push(index);
        }
        if let Some(parent) = parent {
            let ty = &mut self.builder.file.types[parent.index()];
            if extend.is_some() {
                ty.members.push(index);
            } else {
                ty.members.insert(ty.extns_start, index);
                ty.extns_start += 1;
            }
        }
        index
    }

    fn oneof(&mut self, decl: &'ast ast::OneofDecl, message: TypeIndex) {
        if decl.corrupt {
            return;
        }
        let index = OneofIndex(self.builder.file.oneofs.len() as u32);
        let position = self.builder.file.types[message.index()].oneofs.len() as u32;
        self.builder.file.oneofs.push(RawOneof {
            ast: AstRef::new(decl.span, decl.token),
            name: self.session.interner().intern(&decl.name.text),
            fqn: self.session.interner().intern(&self.qualify(&decl.name.text)),
            members: Vec::new(),
            options: None,
            containing: message,
            index: position,
        });
        self.builder.file.types[message.index()].oneofs.push(index);

        for item in &decl.items {
            match item {
                ast::OneofItem::Field(field) => {
                    self.field(field, Some(message), Some(index), None)
                }
                ast::OneofItem::Group(group) => {
                    self.group(group, Some(message), Some(index), None)
                }
                ast::OneofItem::Option(option) => self
                    .builder
                    .pending
                    .options
                    .push((OptionSubject::Oneof(index), option)),
            }
        }
    }

    fn extend(&mut self, decl: &'ast ast::ExtendDecl, parent: Option<TypeIndex>) {
        if decl.corrupt {
            return;
        }
        let index = ExtendIndex(self.builder.file.extends.len() as u32);
        self.builder.file.extends.push(RawExtend {
            ast: AstRef::new(decl.span, decl.token),
            extendee: None,
            parent,
            members: Vec::new(),
        });
        if parent.is_none() {
            self.builder.file.top_extends.push(index);
        }
        self.builder.pending.extends.push((index, decl));

        for item in &decl.items {
            match item {
                ast::ExtendItem::Field(field) => self.field(field, parent, None, Some(index)),
                ast::ExtendItem::Group(group) => self.group(group, parent, None, Some(index)),
            }
        }
    }

    fn service(&mut self, decl: &'ast ast::ServiceDecl) {
        if decl.corrupt {
            return;
        }
        let index = ServiceIndex(self.builder.file.services.len() as u32);
        self.builder.file.services.push(RawService {
            ast: AstRef::new(decl.span, decl.token),
            name: self.session.interner().intern(&decl.name.text),
            fqn: self.session.interner().intern(&self.qualify(&decl.name.text)),
            methods: Vec::new(),
            options: None,
        });
        self.builder.file.top_services.push(index);
        self.push_scope(&decl.name.text);

        for item in &decl.items {
            match item {
                ast::ServiceItem::Method(method) => self.method(method, index),
                ast::ServiceItem::Option(option) => self
                    .builder
                    .pending
                    .options
                    .push((OptionSubject::Service(index), option)),
            }
        }
        self.pop_scope(&decl.name.text);
    }

    fn method(&mut self, decl: &'ast ast::MethodDecl, service: ServiceIndex) {
        if decl.corrupt {
            return;
        }
        let index = MethodIndex(self.builder.file.methods.len() as u32);
        self.builder.file.methods.push(RawMethod {
            ast: AstRef::new(decl.span, decl.token),
            name: self.session.interner().intern(&decl.name.text),
            fqn: self.session.interner().intern(&self.qualify(&decl.name.text)),
            parent: service,
            input: None,
            output: None,
            client_streaming: decl.input.stream,
            server_streaming: decl.output.stream,
            options: None,
        });
        self.builder.file.services[service.index()].methods.push(index);
        self.builder.pending.methods.push((index, decl));
        for option in &decl.options {
            self.builder
                .pending
                .options
                .push((OptionSubject::Method(index), option));
        }
    }

    fn extensions(&mut self, decl: &'ast ast::ExtensionsDecl, message: TypeIndex) {
        for range in &decl.ranges {
            let index = RangeIndex(self.builder.file.ranges.len() as u32);
            self.builder.file.ranges.push(RawRange {
                ast: AstRef::new(range.span, decl.token),
                parent: message,
                first: range.start,
                last: range.last(),
                options: None,
            });
            self.builder.file.types[message.index()].ranges.push(index);
            for option in &decl.options {
                self.builder
                    .pending
                    .options
                    .push((OptionSubject::Range(index), option));
            }
        }
    }

    fn reserved(&mut self, decl: &'ast ast::ReservedDecl, ty: TypeIndex) {
        for range in &decl.ranges {
            let index = RangeIndex(self.builder.file.ranges.len() as u32);
            self.builder.file.ranges.push(RawRange {
                ast: AstRef::new(range.span, decl.token),
                parent: ty,
                first: range.start,
                last: range.last(),
                options: None,
            });
            let raw = &mut self.builder.file.types[ty.index()];
            raw.ranges.insert(raw.ranges_extn_start, index);
            raw.ranges_extn_start += 1;
        }
        for name in &decl.names {
            let index = ReservedNameIndex(self.builder.file.reserved_names.len() as u32);
            self.builder.file.reserved_names.push(RawReservedName {
                ast: AstRef::new(name.span, name.token),
                name: self.session.interner().intern(&name.text),
            });
            self.builder.file.types[ty.index()]
                .reserved_names
                .push(index);
        }
    }

    fn alloc_type(
        &mut self,
        name: &str,
        kind: TypeKind,
        parent: Option<TypeIndex>,
        ast_ref: AstRef,
    ) -> TypeIndex {
        let index = TypeIndex(self.builder.file.types.len() as u32);
        self.builder.file.types.push(RawType::new(
            ast_ref,
            self.session.interner().intern(name),
            self.session.interner().intern(&self.qualify(name)),
            kind,
            parent,
        ));
        match parent {
            Some(parent) => self.builder.file.types[parent.index()].nested.push(index),
            None => self.builder.file.top_types.push(index),
        }
        index
    }

    fn presence_of(&self, label: Option<ast::LabelDecl>) -> Presence {
        match label.map(|l| l.label) {
            Some(AstLabel::Repeated) => Presence::Repeated,
            Some(AstLabel::Required) => Presence::Required,
            Some(AstLabel::Optional) => Presence::Explicit,
            None => match self.builder.file.syntax {
                Syntax::Proto3 => Presence::Implicit,
                _ => Presence::Explicit,
            },
        }
    }

    fn field_number(&mut self, number: &ast::IntLit) -> i32 {
        match number.as_i64() {
            Some(value) if (1..536_870_912).contains(&value) && !(19_000..20_000).contains(&value) => {
                value as i32
            }
            _ => {
                self.number_out_of_range(number);
                0
            }
        }
    }

    fn number_out_of_range(&mut self, number: &ast::IntLit) {
        let value = number.as_i64().unwrap_or(i64::MAX);
        self.report.push(DiagnosticKind::InvalidFieldNumber {
            number: value,
            found: Label::new("declared here", &self.builder.file.path, number.span),
        });
    }

    fn qualify(&self, name: &str) -> String {
        if self.scope.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", self.scope, name)
        }
    }

    fn push_scope(&mut self, name: &str) {
        if !self.scope.is_empty() {
            self.scope.push('.');
        }
        self.scope.push_str(name);
    }

    fn pop_scope(&mut self, name: &str) {
        debug_assert!(self.scope.ends_with(name));
        self.scope
            .truncate((self.scope.len() - name.len()).saturating_sub(1));
    }
}

fn is_allow_alias(option: &ast::OptionDecl) -> bool {
    matches!(
        option.path.as_slice(),
        [ast::OptionNamePart::Ident(ident)] if ident.text == "allow_alias"
    ) && matches!(&option.value, ast::OptionValue::Ident(value) if value.text == "true")
}
