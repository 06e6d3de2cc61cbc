//! The synthetic files every session starts with.
//!
//! The predeclared file holds one type per scalar, at the arena index equal
//! to its [`Scalar`] discriminant. The descriptor file carries the
//! `google.protobuf` definitions option resolution walks: the options
//! messages, their enums, `UninterpretedOption` and `FeatureSet`. Both are
//! built programmatically; no parsing happens inside the session.

use crate::{
    ast::AstRef,
    ir::{
        build::symtab::{self, SymbolTable},
        intern::Interner,
        FileInner, MemberIndex, OptionTarget, Presence, RawMember, RawType, Scalar, TypeIndex,
        TypeKind, TypeRef, SCALARS,
    },
};

pub(crate) const DESCRIPTOR_PATH: &str = "google/protobuf/descriptor.proto";
pub(crate) const PREDECLARED_PATH: &str = "<predeclared>";

pub(crate) fn predeclared_file(interner: &Interner) -> FileInner {
    let mut file = FileInner::new(PREDECLARED_PATH.to_owned(), PREDECLARED_PATH.to_owned());
    for scalar in SCALARS {
        let name = interner.intern(scalar.name());
        file.types.push(RawType::new(
            AstRef::default(),
            name,
            name,
            TypeKind::Scalar(scalar),
            None,
        ));
    }
    file
}

pub(crate) fn descriptor_file(interner: &Interner) -> FileInner {
    let mut b = Builder {
        interner,
        file: FileInner::new(DESCRIPTOR_PATH.to_owned(), DESCRIPTOR_PATH.to_owned()),
    };
    b.file.package = interner.intern("google.protobuf");

    // UninterpretedOption and FeatureSet come first; every options message
    // refers to them.
    b.uninterpreted_option();
    let feature_set = b.feature_set();
    b.file_options(feature_set);
    b.message_options(feature_set);
    b.field_options(feature_set);
    b.oneof_options(feature_set);
    b.enum_options(feature_set);
    b.enum_value_options(feature_set);
    b.service_options(feature_set);
    b.method_options(feature_set);
    b.extension_range_options(feature_set);

    let entries = {
        let mut entries = symtab::local_symbols(interner, &b.file);
        entries.sort_by_key(|entry| entry.fqn);
        entries
    };
    b.file.exported = SymbolTable::from_sorted(entries.clone());
    b.file.imported = SymbolTable::from_sorted(entries);
    b.file
}

struct Builder<'a> {
    interner: &'a Interner,
    file: FileInner,
}

impl Builder<'_> {
    fn message(&mut self, name: &str) -> TypeIndex {
        self.add_type(None, name, TypeKind::Message)
    }

    fn nested_message(&mut self, parent: TypeIndex, name: &str) -> TypeIndex {
        self.add_type(Some(parent), name, TypeKind::Message)
    }

    fn add_type(&mut self, parent: Option<TypeIndex>, name: &str, kind: TypeKind) -> TypeIndex {
        let fqn_str = match parent {
            Some(parent) => {
                let parent_fqn = self.interner.get(self.file.type_(parent).fqn);
                format!("{}.{}", parent_fqn, name)
            }
            None => format!("google.protobuf.{}", name),
        };
        let index = TypeIndex(self.file.types.len() as u32);
        self.file.types.push(RawType::new(
            AstRef::default(),
            self.interner.intern(name),
            self.interner.intern(&fqn_str),
            kind,
            parent,
        ));
        match parent {
            Some(parent) => self.file.types[parent.index()].nested.push(index),
            None => self.file.top_types.push(index),
        }
        index
    }

    /// An enum nested in `parent`; value fqns live in the parent's scope.
    fn enum_(&mut self, parent: TypeIndex, name: &str, values: &[(&str, i32)]) -> TypeIndex {
        let index = self.add_type(Some(parent), name, TypeKind::Enum);
        let scope = self.file.type_(parent).fqn;
        for &(value_name, number) in values {
            let fqn_str = format!("{}.{}", self.interner.get(scope), value_name);
            let member_index = MemberIndex(self.file.members.len() as u32);
            let member = RawMember::new(
                AstRef::default(),
                self.interner.intern(value_name),
                self.interner.intern(&fqn_str),
                number,
                Some(index),
            );
            self.file.members.push(member);
            let ty = &mut self.file.types[index.index()];
            ty.members.insert(ty.extns_start, member_index);
            ty.extns_start += 1;
        }
        index
    }

    fn field(
        &mut self,
        msg: TypeIndex,
        name: &str,
        number: i32,
        elem: TypeRef,
        presence: Presence,
    ) -> MemberIndex {
        let fqn_str = format!("{}.{}", self.interner.get(self.file.type_(msg).fqn), name);
        let index = MemberIndex(self.file.members.len() as u32);
        let mut member = RawMember::new(
            AstRef::default(),
            self.interner.intern(name),
            self.interner.intern(&fqn_str),
            number,
            Some(msg),
        );
        member.container = Some(TypeRef::local(msg));
        member.elem = Some(elem);
        member.set_presence(presence);
        self.file.members.push(member);
        let ty = &mut self.file.types[msg.index()];
        ty.members.insert(ty.extns_start, index);
        ty.extns_start += 1;
        index
    }

    fn optional(&mut self, msg: TypeIndex, name: &str, number: i32, scalar: Scalar) {
        self.field(msg, name, number, TypeRef::scalar(scalar), Presence::Explicit);
    }

    fn repeated(&mut self, msg: TypeIndex, name: &str, number: i32, elem: TypeRef) {
        self.field(msg, name, number, elem, Presence::Repeated);
    }

    fn uninterpreted(&mut self, msg: TypeIndex) {
        // The uninterpreted_option slot every options message carries.
        let target = self.message_ref("UninterpretedOption");
        self.repeated(msg, "uninterpreted_option", 999, target);
    }

    fn message_ref(&mut self, name: &str) -> TypeRef {
        let fqn = self.interner.intern(&format!("google.protobuf.{}", name));
        let (i, _) = self
            .file
            .types
            .iter()
            .enumerate()
            .find(|(_, ty)| ty.fqn == fqn)
            .expect("builtin type referenced before definition");
        TypeRef::local(TypeIndex(i as u32))
    }

    fn feature_set(&mut self) -> TypeIndex {
        let msg = self.message("FeatureSet");
        let field_presence = self.enum_(
            msg,
            "FieldPresence",
            &[
                ("FIELD_PRESENCE_UNKNOWN", 0),
                ("EXPLICIT", 1),
                ("IMPLICIT", 2),
                ("LEGACY_REQUIRED", 3),
            ],
        );
        let enum_type = self.enum_(
            msg,
            "EnumType",
            &[("ENUM_TYPE_UNKNOWN", 0), ("OPEN", 1), ("CLOSED", 2)],
        );
        let repeated_encoding = self.enum_(
            msg,
            "RepeatedFieldEncoding",
            &[
                ("REPEATED_FIELD_ENCODING_UNKNOWN", 0),
                ("PACKED", 1),
                ("EXPANDED", 2),
            ],
        );
        let utf8 = self.enum_(
            msg,
            "Utf8Validation",
            &[("UTF8_VALIDATION_UNKNOWN", 0), ("VERIFY", 2), ("NONE", 3)],
        );
        let message_encoding = self.enum_(
            msg,
            "MessageEncoding",
            &[
                ("MESSAGE_ENCODING_UNKNOWN", 0),
                ("LENGTH_PREFIXED", 1),
                ("DELIMITED", 2),
            ],
        );
        let json_format = self.enum_(
            msg,
            "JsonFormat",
            &[
                ("JSON_FORMAT_UNKNOWN", 0),
                ("ALLOW", 1),
                ("LEGACY_BEST_EFFORT", 2),
            ],
        );
        self.field(
            msg,
            "field_presence",
            1,
            TypeRef::local(field_presence),
            Presence::Explicit,
        );
        self.field(msg, "enum_type", 2, TypeRef::local(enum_type), Presence::Explicit);
        self.field(
            msg,
            "repeated_field_encoding",
            3,
            TypeRef::local(repeated_encoding),
            Presence::Explicit,
        );
        self.field(msg, "utf8_validation", 4, TypeRef::local(utf8), Presence::Explicit);
        self.field(
            msg,
            "message_encoding",
            5,
            TypeRef::local(message_encoding),
            Presence::Explicit,
        );
        self.field(msg, "json_format", 6, TypeRef::local(json_format), Presence::Explicit);
        msg
    }

    fn file_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("FileOptions");
        let optimize_mode = self.enum_(
            msg,
            "OptimizeMode",
            &[("SPEED", 1), ("CODE_SIZE", 2), ("LITE_RUNTIME", 3)],
        );
        self.optional(msg, "java_package", 1, Scalar::String);
        self.optional(msg, "java_outer_classname", 8, Scalar::String);
        self.optional(msg, "java_multiple_files", 10, Scalar::Bool);
        let legacy = self.field(
            msg,
            "java_generate_equals_and_hash",
            20,
            TypeRef::scalar(Scalar::Bool),
            Presence::Explicit,
        );
        self.file.members[legacy.index()].deprecated = true;
        self.optional(msg, "java_string_check_utf8", 27, Scalar::Bool);
        self.field(
            msg,
            "optimize_for",
            9,
            TypeRef::local(optimize_mode),
            Presence::Explicit,
        );
        self.optional(msg, "go_package", 11, Scalar::String);
        self.optional(msg, "cc_generic_services", 16, Scalar::Bool);
        self.optional(msg, "java_generic_services", 17, Scalar::Bool);
        self.optional(msg, "py_generic_services", 18, Scalar::Bool);
        self.optional(msg, "deprecated", 23, Scalar::Bool);
        self.optional(msg, "cc_enable_arenas", 31, Scalar::Bool);
        self.optional(msg, "objc_class_prefix", 36, Scalar::String);
        self.optional(msg, "csharp_namespace", 37, Scalar::String);
        self.optional(msg, "swift_prefix", 39, Scalar::String);
        self.optional(msg, "php_class_prefix", 40, Scalar::String);
        self.optional(msg, "php_namespace", 41, Scalar::String);
        self.optional(msg, "php_metadata_namespace", 44, Scalar::String);
        self.optional(msg, "ruby_package", 45, Scalar::String);
        self.field(msg, "features", 50, TypeRef::local(feature_set), Presence::Explicit);
        self.uninterpreted(msg);
    }

    fn message_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("MessageOptions");
        self.optional(msg, "message_set_wire_format", 1, Scalar::Bool);
        self.optional(msg, "no_standard_descriptor_accessor", 2, Scalar::Bool);
        self.optional(msg, "deprecated", 3, Scalar::Bool);
        self.optional(msg, "map_entry", 7, Scalar::Bool);
        self.optional(msg, "deprecated_legacy_json_field_conflicts", 11, Scalar::Bool);
        self.field(msg, "features", 12, TypeRef::local(feature_set), Presence::Explicit);
        self.uninterpreted(msg);
    }

    fn field_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("FieldOptions");
        let ctype = self.enum_(
            msg,
            "CType",
            &[("STRING", 0), ("CORD", 1), ("STRING_PIECE", 2)],
        );
        let jstype = self.enum_(
            msg,
            "JSType",
            &[("JS_NORMAL", 0), ("JS_STRING", 1), ("JS_NUMBER", 2)],
        );
        let retention = self.enum_(
            msg,
            "OptionRetention",
            &[
                ("RETENTION_UNKNOWN", 0),
                ("RETENTION_RUNTIME", 1),
                ("RETENTION_SOURCE", 2),
            ],
        );
        let targets = self.enum_(
            msg,
            "OptionTargetType",
            &[
                ("TARGET_TYPE_UNKNOWN", 0),
                ("TARGET_TYPE_FILE", OptionTarget::File as i32),
                ("TARGET_TYPE_EXTENSION_RANGE", OptionTarget::ExtensionRange as i32),
                ("TARGET_TYPE_MESSAGE", OptionTarget::Message as i32),
                ("TARGET_TYPE_FIELD", OptionTarget::Field as i32),
                ("TARGET_TYPE_ONEOF", OptionTarget::Oneof as i32),
                ("TARGET_TYPE_ENUM", OptionTarget::Enum as i32),
                ("TARGET_TYPE_ENUM_ENTRY", OptionTarget::EnumEntry as i32),
                ("TARGET_TYPE_SERVICE", OptionTarget::Service as i32),
                ("TARGET_TYPE_METHOD", OptionTarget::Method as i32),
            ],
        );
        self.field(msg, "ctype", 1, TypeRef::local(ctype), Presence::Explicit);
        self.optional(msg, "packed", 2, Scalar::Bool);
        self.field(msg, "jstype", 6, TypeRef::local(jstype), Presence::Explicit);
        self.optional(msg, "lazy", 5, Scalar::Bool);
        self.optional(msg, "unverified_lazy", 15, Scalar::Bool);
        self.optional(msg, "deprecated", 3, Scalar::Bool);
        self.optional(msg, "weak", 10, Scalar::Bool);
        self.optional(msg, "debug_redact", 16, Scalar::Bool);
        self.field(msg, "retention", 17, TypeRef::local(retention), Presence::Explicit);
        self.repeated(msg, "targets", 19, TypeRef::local(targets));
        self.field(msg, "features", 21, TypeRef::local(feature_set), Presence::Explicit);
        self.uninterpreted(msg);
    }

    fn oneof_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("OneofOptions");
        self.field(msg, "features", 1, TypeRef::local(feature_set), Presence::Explicit);
        self.uninterpreted(msg);
    }

    fn enum_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("EnumOptions");
        self.optional(msg, "allow_alias", 2, Scalar::Bool);
        self.optional(msg, "deprecated", 3, Scalar::Bool);
        self.optional(msg, "deprecated_legacy_json_field_conflicts", 6, Scalar::Bool);
        self.field(msg, "features", 7, TypeRef::local(feature_set), Presence::Explicit);
        self.uninterpreted(msg);
    }

    fn enum_value_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("EnumValueOptions");
        self.optional(msg, "deprecated", 1, Scalar::Bool);
        self.field(msg, "features", 2, TypeRef::local(feature_set), Presence::Explicit);
        self.optional(msg, "debug_redact", 3, Scalar::Bool);
        self.uninterpreted(msg);
    }

    fn service_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("ServiceOptions");
        self.field(msg, "features", 34, TypeRef::local(feature_set), Presence::Explicit);
        self.optional(msg, "deprecated", 33, Scalar::Bool);
        self.uninterpreted(msg);
    }

    fn method_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("MethodOptions");
        let idempotency = self.enum_(
            msg,
            "IdempotencyLevel",
            &[
                ("IDEMPOTENCY_UNKNOWN", 0),
                ("NO_SIDE_EFFECTS", 1),
                ("IDEMPOTENT", 2),
            ],
        );
        self.optional(msg, "deprecated", 33, Scalar::Bool);
        self.field(
            msg,
            "idempotency_level",
            34,
            TypeRef::local(idempotency),
            Presence::Explicit,
        );
        self.field(msg, "features", 35, TypeRef::local(feature_set), Presence::Explicit);
        self.uninterpreted(msg);
    }

    fn extension_range_options(&mut self, feature_set: TypeIndex) {
        let msg = self.message("ExtensionRangeOptions");
        self.field(msg, "features", 50, TypeRef::local(feature_set), Presence::Explicit);
        self.uninterpreted(msg);
    }

    fn uninterpreted_option(&mut self) {
        let msg = self.message("UninterpretedOption");
        let name_part = self.nested_message(msg, "NamePart");
        self.field(
            name_part,
            "name_part",
            1,
            TypeRef::scalar(Scalar::String),
            Presence::Required,
        );
        self.field(
            name_part,
            "is_extension",
            2,
            TypeRef::scalar(Scalar::Bool),
            Presence::Required,
        );
        self.repeated(msg, "name", 2, TypeRef::local(name_part));
        self.optional(msg, "identifier_value", 3, Scalar::String);
        self.optional(msg, "positive_int_value", 4, Scalar::Uint64);
        self.optional(msg, "negative_int_value", 5, Scalar::Int64);
        self.optional(msg, "double_value", 6, Scalar::Double);
        self.optional(msg, "string_value", 7, Scalar::Bytes);
        self.optional(msg, "aggregate_value", 8, Scalar::String);
    }
}
