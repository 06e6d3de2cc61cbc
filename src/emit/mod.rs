//! Descriptor emission.
//!
//! Produces wire-format `FileDescriptorProto` / `FileDescriptorSet` bytes
//! from sealed files, including `SourceCodeInfo` with paths, spans and
//! comment attribution. Emitted artifacts are canonicalized after
//! construction: imports follow source order, locations are sorted by span,
//! and a synthetic whole-file location is prepended.

pub(crate) mod tag;
pub(crate) mod types;
#[cfg(test)]
mod tests;

use prost::Message;
use prost_types::source_code_info::Location;

use crate::{
    ast::{AstRef, Span, Syntax},
    comments::CommentMap,
    ir::{
        build::to_json_name, resolve_slot, FileInner, MemberIndex, MessageValueIndex,
        OneofIndex, Presence, RangeIndex, RawMember, Scalar, ServiceIndex, Session, TypeIndex,
        TypeKind, TypeRef, ValueIndex,
    },
    wire, File,
};

/// Knobs for descriptor emission.
pub struct EmitOptions<'a> {
    /// Emit `SourceCodeInfo` and the private file-info extension.
    pub include_source_info: bool,
    /// Files for which this returns true are left out of the set.
    pub exclude: Option<&'a dyn Fn(&File) -> bool>,
}

impl Default for EmitOptions<'_> {
    fn default() -> Self {
        EmitOptions {
            include_source_info: false,
            exclude: None,
        }
    }
}

impl std::fmt::Debug for EmitOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitOptions")
            .field("include_source_info", &self.include_source_info)
            .field("exclude", &self.exclude.is_some())
            .finish()
    }
}

impl File {
    /// Serializes this file as a `FileDescriptorProto`.
    pub fn descriptor_proto_bytes(&self, options: &EmitOptions<'_>) -> Vec<u8> {
        self.descriptor_proto(options).encode_to_vec()
    }

    pub(crate) fn descriptor_proto(&self, options: &EmitOptions<'_>) -> types::FileDescriptorProto {
        let mut emitter = Emitter {
            session: &self.session,
            file: &self.inner,
            include_source_info: options.include_source_info,
            locations: Vec::new(),
            path: Vec::new(),
        };
        emitter.file_proto()
    }
}

/// Serializes a `FileDescriptorSet` for a file graph. Files keep the order
/// given (topological import order), except that `descriptor.proto` always
/// sorts last.
pub fn descriptor_set_bytes(files: &[File], options: &EmitOptions<'_>) -> Vec<u8> {
    let mut included: Vec<&File> = files
        .iter()
        .filter(|file| match options.exclude {
            Some(exclude) => !exclude(file),
            None => true,
        })
        .collect();
    included.sort_by_key(|file| file.inner.is_descriptor());

    let set = types::FileDescriptorSet {
        file: included
            .into_iter()
            .map(|file| file.descriptor_proto(options))
            .collect(),
    };
    set.encode_to_vec()
}

struct Emitter<'a> {
    session: &'a Session,
    file: &'a FileInner,
    include_source_info: bool,
    locations: Vec<Location>,
    path: Vec<i32>,
}

impl<'a> Emitter<'a> {
    fn file_proto(&mut self) -> types::FileDescriptorProto {
        let file = self.file;
        let mut proto = types::FileDescriptorProto {
            name: Some(file.path.clone()),
            ..Default::default()
        };

        if file.package != crate::ir::intern::InternId::EMPTY {
            proto.package = Some(self.session.interner().get(file.package).to_string());
            if let Some(package_ast) = file.package_ast {
                self.location(&[tag::file::PACKAGE], package_ast);
            }
        }
        if let Some(syntax_ast) = file.syntax_ast {
            match file.syntax {
                Syntax::Proto2 => proto.syntax = Some("proto2".to_owned()),
                Syntax::Proto3 => proto.syntax = Some("proto3".to_owned()),
                Syntax::Edition(year) => {
                    proto.syntax = Some("editions".to_owned());
                    proto.edition = Some(edition_number(year));
                    self.location(&[tag::file::EDITION], syntax_ast);
                }
            }
            if !file.syntax.is_editions() {
                self.location(&[tag::file::SYNTAX], syntax_ast);
            }
        }

        self.dependencies(&mut proto);
        self.top_level(&mut proto);

        if let Some(mv) = file.options {
            proto.options = Some(self.options(mv, &[tag::file::OPTIONS]));
        }

        if self.include_source_info {
            proto.file_info = Some(types::FileInfo {
                is_syntax_unspecified: Some(file.syntax_unspecified),
                unused_dependency: self.unused_dependencies(&proto.dependency),
            });
            proto.source_code_info = Some(self.source_code_info());
        }
        proto
    }

    /// Imports are listed in source order by declaration offset, not in
    /// import-table order, so table refactors never perturb output.
    fn dependencies(&mut self, proto: &mut types::FileDescriptorProto) {
        let mut direct: Vec<_> = self
            .file
            .imports
            .direct()
            .iter()
            .filter(|entry| entry.decl.is_some())
            .collect();
        direct.sort_by_key(|entry| entry.decl.unwrap().span.start.offset);

        for (i, entry) in direct.iter().enumerate() {
            proto.dependency.push(entry.original.clone());
            let decl = entry.decl.unwrap();
            self.location(&[tag::file::DEPENDENCY, i as i32], decl);
            match entry.kind {
                Some(crate::ast::ImportKind::Public) => {
                    let j = proto.public_dependency.len() as i32;
                    proto.public_dependency.push(i as i32);
                    self.location(&[tag::file::PUBLIC_DEPENDENCY, j], decl);
                }
                Some(crate::ast::ImportKind::Weak) => {
                    let j = proto.weak_dependency.len() as i32;
                    proto.weak_dependency.push(i as i32);
                    self.location(&[tag::file::WEAK_DEPENDENCY, j], decl);
                }
                _ => {}
            }
        }
    }

    fn unused_dependencies(&self, dependency: &[String]) -> Vec<i32> {
        let mut unused = Vec::new();
        for entry in self.file.imports.direct() {
            if entry.kind == Some(crate::ast::ImportKind::Default) && !entry.used {
                if let Some(i) = dependency.iter().position(|d| d == &entry.original) {
                    unused.push(i as i32);
                }
            }
        }
        unused
    }

    fn top_level(&mut self, proto: &mut types::FileDescriptorProto) {
        let top_types = self.file.top_types.clone();
        for &index in &top_types {
            if self.file.type_(index).is_enum() {
                let i = proto.enum_type.len() as i32;
                self.push_path(&[tag::file::ENUM_TYPE, i]);
                let enum_proto = self.enum_proto(index);
                self.pop_path(2);
                proto.enum_type.push(enum_proto);
            } else {
                let i = proto.message_type.len() as i32;
                self.push_path(&[tag::file::MESSAGE_TYPE, i]);
                let message = self.message_proto(index);
                self.pop_path(2);
                proto.message_type.push(message);
            }
        }

        let top_extends = self.file.top_extends.clone();
        let mut i = 0;
        for &extend in &top_extends {
            let members = self.file.extends[extend.index()].members.clone();
            for member in members {
                self.push_path(&[tag::file::EXTENSION, i]);
                let field = self.field_proto(member);
                self.pop_path(2);
                proto.extension.push(field);
                i += 1;
            }
        }

        let top_services = self.file.top_services.clone();
        for (i, &service) in top_services.iter().enumerate() {
            self.push_path(&[tag::file::SERVICE, i as i32]);
            let service_proto = self.service_proto(service);
            self.pop_path(2);
            proto.service.push(service_proto);
        }
    }

    fn message_proto(&mut self, index: TypeIndex) -> types::DescriptorProto {
        let ty = self.file.type_(index);
        self.location(&[], ty.ast);

        let mut proto = types::DescriptorProto {
            name: Some(self.session.interner().get(ty.name).to_string()),
            ..Default::default()
        };

        let fields = ty.fields().to_vec();
        for (i, &member) in fields.iter().enumerate() {
            self.push_path(&[tag::message::FIELD, i as i32]);
            let field = self.field_proto(member);
            self.pop_path(2);
            proto.field.push(field);
        }

        let nested = ty.nested.clone();
        for &child in &nested {
            if self.file.type_(child).is_enum() {
                let i = proto.enum_type.len() as i32;
                self.push_path(&[tag::message::ENUM_TYPE, i]);
                let enum_proto = self.enum_proto(child);
                self.pop_path(2);
                proto.enum_type.push(enum_proto);
            } else {
                let i = proto.nested_type.len() as i32;
                self.push_path(&[tag::message::NESTED_TYPE, i]);
                let message = self.message_proto(child);
                self.pop_path(2);
                proto.nested_type.push(message);
            }
        }

        let extension_ranges = ty.extension_ranges().to_vec();
        for (i, &range) in extension_ranges.iter().enumerate() {
            self.push_path(&[tag::message::EXTENSION_RANGE, i as i32]);
            let range_proto = self.extension_range_proto(range);
            self.pop_path(2);
            proto.extension_range.push(range_proto);
        }

        let extensions = ty.extensions().to_vec();
        for (i, &member) in extensions.iter().enumerate() {
            self.push_path(&[tag::message::EXTENSION, i as i32]);
            let field = self.field_proto(member);
            self.pop_path(2);
            proto.extension.push(field);
        }

        let oneofs = ty.oneofs.clone();
        for (i, &oneof) in oneofs.iter().enumerate() {
            self.push_path(&[tag::message::ONEOF_DECL, i as i32]);
            let oneof_proto = self.oneof_proto(oneof);
            self.pop_path(2);
            proto.oneof_decl.push(oneof_proto);
        }
        self.synthesize_proto3_oneofs(&fields, &mut proto);

        // Message reserved and extension ranges store an exclusive end.
        let reserved = ty.reserved_ranges().to_vec();
        for (i, &range) in reserved.iter().enumerate() {
            let raw = self.file.range(range);
            self.location(&[tag::message::RESERVED_RANGE, i as i32], raw.ast);
            proto.reserved_range.push(types::ReservedRange {
                start: Some(raw.first),
                end: Some(raw.last.saturating_add(1)),
            });
        }
        let reserved_names = ty.reserved_names.clone();
        for (i, &name) in reserved_names.iter().enumerate() {
            let raw = &self.file.reserved_names[name.index()];
            self.location(&[tag::message::RESERVED_NAME, i as i32], raw.ast);
            proto
                .reserved_name
                .push(self.session.interner().get(raw.name).to_string());
        }

        if let Some(mv) = ty.options {
            proto.options = Some(self.options(mv, &[tag::message::OPTIONS]));
        }
        proto
    }

    /// A proto3 field with explicit presence outside any declared oneof
    /// gets a synthetic single-field oneof.
    fn synthesize_proto3_oneofs(
        &mut self,
        fields: &[MemberIndex],
        proto: &mut types::DescriptorProto,
    ) {
        if self.file.syntax != Syntax::Proto3 {
            return;
        }
        let mut names: Vec<String> = proto
            .oneof_decl
            .iter()
            .filter_map(|o| o.name.clone())
            .collect();
        names.extend(proto.field.iter().filter_map(|f| f.name.clone()));

        for (i, &member) in fields.iter().enumerate() {
            let raw = self.file.member(member);
            let synthetic = raw.oneof_index().is_none()
                && !raw.is_extension
                && raw.presence() == Presence::Explicit;
            if !synthetic {
                continue;
            }
            let mut name = format!("_{}", self.session.interner().get(raw.name));
            while names.contains(&name) {
                name.insert(0, 'X');
            }
            names.push(name.clone());

            let oneof_index = proto.oneof_decl.len() as i32;
            proto.oneof_decl.push(types::OneofDescriptorProto {
                name: Some(name),
                options: None,
            });
            let field = &mut proto.field[i];
            field.oneof_index = Some(oneof_index);
            field.proto3_optional = Some(true);
        }
    }

    fn extension_range_proto(&mut self, range: RangeIndex) -> types::ExtensionRange {
        let raw = self.file.range(range);
        self.location(&[], raw.ast);
        let options = raw
            .options
            .map(|mv| self.options(mv, &[tag::message::extension_range::OPTIONS]));
        types::ExtensionRange {
            start: Some(raw.first),
            end: Some(raw.last.saturating_add(1)),
            options,
        }
    }

    fn field_proto(&mut self, index: MemberIndex) -> types::FieldDescriptorProto {
        let member = self.file.member(index);
        self.location(&[], member.ast);

        let name = self.session.interner().get(member.name).to_string();
        let mut proto = types::FieldDescriptorProto {
            name: Some(name.clone()),
            number: Some(member.number),
            label: Some(match member.presence() {
                Presence::Required => 2,
                Presence::Repeated => 3,
                _ => 1,
            }),
            ..Default::default()
        };

        if let Some(elem) = member.elem {
            let target = resolve_slot(self.session, self.file, elem.file);
            let raw = target.get().type_(elem.index);
            match raw.kind {
                TypeKind::Scalar(scalar) => proto.r#type = Some(scalar.descriptor_type()),
                TypeKind::Message => {
                    proto.r#type = Some(if member.is_group { 10 } else { 11 });
                    proto.type_name = Some(format!(".{}", self.session.interner().get(raw.fqn)));
                }
                TypeKind::Enum => {
                    proto.r#type = Some(14);
                    proto.type_name = Some(format!(".{}", self.session.interner().get(raw.fqn)));
                }
            }
        }

        if member.is_extension {
            if let Some(container) = member.container {
                proto.extendee = Some(format!(".{}", self.type_fqn(container)));
            }
        } else {
            let json_name = match member.pseudo.json_name {
                Some((id, _)) => self.session.interner().get(id).to_string(),
                None => to_json_name(&name),
            };
            proto.json_name = Some(json_name);
        }

        if let Some(oneof) = member.oneof_index() {
            let raw = self.file.oneof(oneof);
            debug_assert_eq!(Some(raw.containing), member.parent);
            proto.oneof_index = Some(raw.index as i32);
        }
        if let Some(default) = member.pseudo.default_value {
            proto.default_value = self.default_string(member, default);
        }
        if let Some(mv) = member.options {
            proto.options = Some(self.options(mv, &[tag::field::OPTIONS]));
        }
        proto
    }

    fn oneof_proto(&mut self, index: OneofIndex) -> types::OneofDescriptorProto {
        let oneof = self.file.oneof(index);
        self.location(&[], oneof.ast);
        let options = oneof
            .options
            .map(|mv| self.options(mv, &[tag::oneof::OPTIONS]));
        types::OneofDescriptorProto {
            name: Some(self.session.interner().get(oneof.name).to_string()),
            options,
        }
    }

    fn enum_proto(&mut self, index: TypeIndex) -> types::EnumDescriptorProto {
        let ty = self.file.type_(index);
        self.location(&[], ty.ast);

        let mut proto = types::EnumDescriptorProto {
            name: Some(self.session.interner().get(ty.name).to_string()),
            ..Default::default()
        };

        let values = ty.fields().to_vec();
        for (i, &member) in values.iter().enumerate() {
            self.push_path(&[tag::enum_::VALUE, i as i32]);
            let raw = self.file.member(member);
            self.location(&[], raw.ast);
            let options = raw
                .options
                .map(|mv| self.options(mv, &[tag::enum_value::OPTIONS]));
            proto.value.push(types::EnumValueDescriptorProto {
                name: Some(self.session.interner().get(raw.name).to_string()),
                number: Some(raw.number),
                options,
            });
            self.pop_path(2);
        }

        // Enum reserved ranges keep an inclusive end, unlike messages.
        let reserved = ty.reserved_ranges().to_vec();
        for (i, &range) in reserved.iter().enumerate() {
            let raw = self.file.range(range);
            self.location(&[tag::enum_::RESERVED_RANGE, i as i32], raw.ast);
            proto.reserved_range.push(types::EnumReservedRange {
                start: Some(raw.first),
                end: Some(raw.last),
            });
        }
        let reserved_names = ty.reserved_names.clone();
        for (i, &name) in reserved_names.iter().enumerate() {
            let raw = &self.file.reserved_names[name.index()];
            self.location(&[tag::enum_::RESERVED_NAME, i as i32], raw.ast);
            proto
                .reserved_name
                .push(self.session.interner().get(raw.name).to_string());
        }

        if let Some(mv) = ty.options {
            proto.options = Some(self.options(mv, &[tag::enum_::OPTIONS]));
        }
        proto
    }

    fn service_proto(&mut self, index: ServiceIndex) -> types::ServiceDescriptorProto {
        let service = self.file.service(index);
        self.location(&[], service.ast);

        let mut proto = types::ServiceDescriptorProto {
            name: Some(self.session.interner().get(service.name).to_string()),
            ..Default::default()
        };

        let methods = service.methods.clone();
        for (i, &method) in methods.iter().enumerate() {
            self.push_path(&[tag::service::METHOD, i as i32]);
            let raw = self.file.method(method);
            self.location(&[], raw.ast);
            let options = raw
                .options
                .map(|mv| self.options(mv, &[tag::method::OPTIONS]));
            proto.method.push(types::MethodDescriptorProto {
                name: Some(self.session.interner().get(raw.name).to_string()),
                input_type: raw.input.map(|ty| format!(".{}", self.type_fqn(ty))),
                output_type: raw.output.map(|ty| format!(".{}", self.type_fqn(ty))),
                options,
                client_streaming: raw.client_streaming.then_some(true),
                server_streaming: raw.server_streaming.then_some(true),
            });
            self.pop_path(2);
        }

        if let Some(mv) = service.options {
            proto.options = Some(self.options(mv, &[tag::service::OPTIONS]));
        }
        proto
    }

    /// Encodes an options tree and records its source locations, descending
    /// into sub-messages by field number.
    fn options(&mut self, mv: MessageValueIndex, base: &[i32]) -> types::EncodedOptions {
        if self.include_source_info {
            self.push_path(base);
            self.option_locations(mv);
            self.pop_path(base.len());
        }
        types::EncodedOptions {
            encoded: wire::encode_message_value(self.session, self.file, mv),
        }
    }

    fn option_locations(&mut self, mv: MessageValueIndex) {
        let values = self.file.message_value(mv).values.clone();
        for value_index in values {
            let value = self.file.value(value_index);
            let member = value.member();
            let member_file = resolve_slot(self.session, self.file, member.file);
            let raw = member_file.get().member(member.index);
            let number = raw.number;
            let is_message = raw.elem.map_or(false, |elem| {
                let elem_file = resolve_slot(self.session, member_file.get(), elem.file);
                elem_file.get().type_(elem.index).is_message()
            });
            let spans: Vec<Span> = value.option_paths.clone();

            self.path.push(number);
            if is_message && !raw_is_repeated(self.session, self.file, value_index) {
                let child = MessageValueIndex(self.file.value(value_index).bits() as u32);
                self.option_locations(child);
            } else {
                for span in spans {
                    self.location(&[], AstRef::new(span, u32::MAX));
                }
            }
            self.path.pop();
        }
    }

    fn source_code_info(&mut self) -> types::SourceCodeInfo {
        let mut locations = std::mem::take(&mut self.locations);
        locations.sort_by(|a, b| a.span.cmp(&b.span).then_with(|| a.path.cmp(&b.path)));
        locations.dedup_by(|a, b| a.path == b.path && a.span == b.span);

        let mut all = Vec::with_capacity(locations.len() + 1);
        all.push(Location {
            path: Vec::new(),
            span: span_to_vec(self.file.span),
            ..Default::default()
        });
        all.extend(locations);
        types::SourceCodeInfo { location: all }
    }

    /// Records one location; the path is cloned, never aliased.
    fn location(&mut self, suffix: &[i32], ast: AstRef) {
        if !self.include_source_info {
            return;
        }
        let mut path = self.path.clone();
        path.extend_from_slice(suffix);

        let mut location = Location {
            path,
            span: span_to_vec(ast.span),
            ..Default::default()
        };
        if let Some(comments) = comments_for(&self.file.comments, ast) {
            location.leading_comments = comments.0;
            location.trailing_comments = comments.1;
            location.leading_detached_comments = comments.2;
        }
        self.locations.push(location);
    }

    fn push_path(&mut self, segments: &[i32]) {
        self.path.extend_from_slice(segments);
    }

    fn pop_path(&mut self, n: usize) {
        self.path.truncate(self.path.len() - n);
    }

    fn type_fqn(&self, ty: TypeRef) -> String {
        let target = resolve_slot(self.session, self.file, ty.file);
        self.session
            .interner()
            .get(target.get().type_(ty.index).fqn)
            .to_string()
    }

    /// Field defaults are emitted as strings, with protoc's exact forms.
    fn default_string(&self, member: &RawMember, value: ValueIndex) -> Option<String> {
        let elem = member.elem?;
        let target = resolve_slot(self.session, self.file, elem.file);
        let raw = target.get().type_(elem.index);
        let bits = self.file.value(value).bits();

        Some(match raw.kind {
            TypeKind::Scalar(scalar) => match scalar {
                Scalar::Double | Scalar::Float => {
                    let v = f64::from_bits(bits);
                    let v = if scalar == Scalar::Float {
                        v as f32 as f64
                    } else {
                        v
                    };
                    if v.is_nan() {
                        "nan".to_owned()
                    } else if v == f64::INFINITY {
                        "inf".to_owned()
                    } else if v == f64::NEG_INFINITY {
                        "-inf".to_owned()
                    } else if scalar == Scalar::Float {
                        format!("{}", v as f32)
                    } else {
                        format!("{}", v)
                    }
                }
                Scalar::Bool => {
                    if bits != 0 {
                        "true".to_owned()
                    } else {
                        "false".to_owned()
                    }
                }
                Scalar::Int32
                | Scalar::Int64
                | Scalar::Sint32
                | Scalar::Sint64
                | Scalar::Sfixed32
                | Scalar::Sfixed64 => format!("{}", bits as i64),
                Scalar::Uint32 | Scalar::Uint64 | Scalar::Fixed32 | Scalar::Fixed64 => {
                    format!("{}", bits)
                }
                Scalar::String => {
                    let id = crate::ir::intern::InternId::from_raw(bits as u32);
                    self.session.interner().get(id).to_string()
                }
                Scalar::Bytes => {
                    let id = crate::ir::intern::BytesId::from_raw(bits as u32);
                    escape_bytes(&self.session.interner().get_bytes(id))
                }
            },
            TypeKind::Enum => {
                let number = bits as i64 as i32;
                let found = raw.fields().iter().copied().find(|&value| {
                    target.get().member(value).number == number
                })?;
                self.session
                    .interner()
                    .get(target.get().member(found).name)
                    .to_string()
            }
            TypeKind::Message => return None,
        })
    }
}

fn raw_is_repeated(session: &Session, file: &FileInner, value: ValueIndex) -> bool {
    let value = file.value(value);
    let member = value.member();
    let member_file = resolve_slot(session, file, member.file);
    member_file.get().member(member.index).is_repeated()
}

fn comments_for(
    map: &CommentMap,
    ast: AstRef,
) -> Option<(Option<String>, Option<String>, Vec<String>)> {
    if ast.token == u32::MAX {
        return None;
    }
    let comments = map.get(ast.token)?;
    Some((
        comments.leading.clone(),
        comments.trailing.clone(),
        comments.detached.clone(),
    ))
}

/// Three integers when the span is on one line, otherwise four. All
/// zero-based.
fn span_to_vec(span: Span) -> Vec<i32> {
    if span.start.line == span.end.line {
        vec![
            span.start.line as i32,
            span.start.col as i32,
            span.end.col as i32,
        ]
    } else {
        vec![
            span.start.line as i32,
            span.start.col as i32,
            span.end.line as i32,
            span.end.col as i32,
        ]
    }
}

fn edition_number(year: u16) -> i32 {
    match year {
        2023 => 1000,
        2024 => 1001,
        other => other as i32,
    }
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}
