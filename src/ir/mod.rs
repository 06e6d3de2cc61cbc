//! The typed entity graph files are lowered into.
//!
//! Every file owns a set of arenas of raw entity structs; anything that
//! crosses a file boundary does so through a `(file slot, arena index)` pair
//! resolved against the importer's import table. A [`File`] handle pairs the
//! session with the sealed per-file state and is cheap to clone; sealed files
//! are immutable and shared by reference between importers.

pub(crate) mod build;
pub(crate) mod builtin;
pub(crate) mod intern;
pub(crate) mod path;
pub(crate) mod value;

use std::{collections::HashMap, fmt, sync::Arc};

use once_cell::sync::OnceCell;

use crate::{
    ast::{AstRef, Span, Syntax},
    comments::CommentMap,
    ir::{
        build::{imports::ImportTable, symtab::SymbolTable},
        intern::{InternId, Interner},
        value::{MessageValue, Value},
    },
};

macro_rules! define_index {
    ($($name:ident),* $(,)?) => {$(
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub(crate) struct $name(pub(crate) u32);

        impl $name {
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    )*};
}

define_index!(
    TypeIndex,
    MemberIndex,
    OneofIndex,
    ExtendIndex,
    RangeIndex,
    ReservedNameIndex,
    ServiceIndex,
    MethodIndex,
    ValueIndex,
    MessageValueIndex,
);

/// Position of a file in the importer's import table. Two sentinels address
/// the file itself and the session's synthetic scalar file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FileSlot(pub(crate) u32);

impl FileSlot {
    pub(crate) const LOCAL: FileSlot = FileSlot(u32::MAX);
    pub(crate) const PREDECLARED: FileSlot = FileSlot(u32::MAX - 1);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A type reference that may point into another file's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TypeRef {
    pub(crate) file: FileSlot,
    pub(crate) index: TypeIndex,
}

impl TypeRef {
    pub(crate) fn local(index: TypeIndex) -> TypeRef {
        TypeRef {
            file: FileSlot::LOCAL,
            index,
        }
    }

    pub(crate) fn scalar(scalar: Scalar) -> TypeRef {
        TypeRef {
            file: FileSlot::PREDECLARED,
            index: TypeIndex(scalar as u32),
        }
    }
}

/// A member reference that may point into another file's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemberRef {
    pub(crate) file: FileSlot,
    pub(crate) index: MemberIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum SymbolKind {
    Package,
    Scalar,
    Message,
    Enum,
    Field,
    EnumValue,
    Extension,
    Oneof,
    Service,
    Method,
}

impl SymbolKind {
    pub(crate) fn is_type(self) -> bool {
        matches!(
            self,
            SymbolKind::Scalar | SymbolKind::Message | SymbolKind::Enum
        )
    }
}

/// A named definition: kind plus the arena index of the referent within its
/// file. Package symbols carry no index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Symbol {
    pub(crate) kind: SymbolKind,
    pub(crate) index: u32,
}

/// A symbol seen from a particular file: the slot locates the defining file
/// in that file's import table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SymbolRef {
    pub(crate) file: FileSlot,
    pub(crate) symbol: Symbol,
}

/// The predeclared scalar types. Arena indices in the synthetic predeclared
/// file equal these discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Scalar {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    Uint32,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

pub(crate) const SCALARS: [Scalar; 15] = [
    Scalar::Double,
    Scalar::Float,
    Scalar::Int64,
    Scalar::Uint64,
    Scalar::Int32,
    Scalar::Fixed64,
    Scalar::Fixed32,
    Scalar::Bool,
    Scalar::String,
    Scalar::Bytes,
    Scalar::Uint32,
    Scalar::Sfixed32,
    Scalar::Sfixed64,
    Scalar::Sint32,
    Scalar::Sint64,
];

impl Scalar {
    pub fn name(self) -> &'static str {
        match self {
            Scalar::Double => "double",
            Scalar::Float => "float",
            Scalar::Int64 => "int64",
            Scalar::Uint64 => "uint64",
            Scalar::Int32 => "int32",
            Scalar::Fixed64 => "fixed64",
            Scalar::Fixed32 => "fixed32",
            Scalar::Bool => "bool",
            Scalar::String => "string",
            Scalar::Bytes => "bytes",
            Scalar::Uint32 => "uint32",
            Scalar::Sfixed32 => "sfixed32",
            Scalar::Sfixed64 => "sfixed64",
            Scalar::Sint32 => "sint32",
            Scalar::Sint64 => "sint64",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Scalar> {
        Some(match name {
            "double" => Scalar::Double,
            "float" => Scalar::Float,
            "int64" => Scalar::Int64,
            "uint64" => Scalar::Uint64,
            "int32" => Scalar::Int32,
            "fixed64" => Scalar::Fixed64,
            "fixed32" => Scalar::Fixed32,
            "bool" => Scalar::Bool,
            "string" => Scalar::String,
            "bytes" => Scalar::Bytes,
            "uint32" => Scalar::Uint32,
            "sfixed32" => Scalar::Sfixed32,
            "sfixed64" => Scalar::Sfixed64,
            "sint32" => Scalar::Sint32,
            "sint64" => Scalar::Sint64,
            _ => return None,
        })
    }

    /// `field_descriptor_proto::Type` number for the scalar.
    pub(crate) fn descriptor_type(self) -> i32 {
        match self {
            Scalar::Double => 1,
            Scalar::Float => 2,
            Scalar::Int64 => 3,
            Scalar::Uint64 => 4,
            Scalar::Int32 => 5,
            Scalar::Fixed64 => 6,
            Scalar::Fixed32 => 7,
            Scalar::Bool => 8,
            Scalar::String => 9,
            Scalar::Bytes => 12,
            Scalar::Uint32 => 13,
            Scalar::Sfixed32 => 15,
            Scalar::Sfixed64 => 16,
            Scalar::Sint32 => 17,
            Scalar::Sint64 => 18,
        }
    }

    pub(crate) fn is_map_key(self) -> bool {
        !matches!(self, Scalar::Double | Scalar::Float | Scalar::Bytes)
    }
}

/// How a field tracks presence when it is not a oneof member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub(crate) enum Presence {
    Implicit = 1,
    Explicit = 2,
    Required = 3,
    Repeated = 4,
}

/// Sites an option can be applied to; numbers match
/// `FieldOptions.OptionTargetType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub(crate) enum OptionTarget {
    File = 1,
    ExtensionRange = 2,
    Message = 3,
    Field = 4,
    Oneof = 5,
    Enum = 6,
    EnumEntry = 7,
    Service = 8,
    Method = 9,
}

impl OptionTarget {
    pub(crate) fn from_number(number: i32) -> Option<OptionTarget> {
        Some(match number {
            1 => OptionTarget::File,
            2 => OptionTarget::ExtensionRange,
            3 => OptionTarget::Message,
            4 => OptionTarget::Field,
            5 => OptionTarget::Oneof,
            6 => OptionTarget::Enum,
            7 => OptionTarget::EnumEntry,
            8 => OptionTarget::Service,
            9 => OptionTarget::Method,
            _ => return None,
        })
    }

    pub(crate) fn describe(self) -> &'static str {
        match self {
            OptionTarget::File => "a file",
            OptionTarget::ExtensionRange => "an extension range",
            OptionTarget::Message => "a message",
            OptionTarget::Field => "a field",
            OptionTarget::Oneof => "a oneof",
            OptionTarget::Enum => "an enum",
            OptionTarget::EnumEntry => "an enum value",
            OptionTarget::Service => "a service",
            OptionTarget::Method => "a method",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeKind {
    Message,
    Enum,
    Scalar(Scalar),
}

/// A message, enum or scalar type.
#[derive(Debug)]
pub(crate) struct RawType {
    pub(crate) ast: AstRef,
    pub(crate) name: InternId,
    pub(crate) fqn: InternId,
    pub(crate) kind: TypeKind,
    pub(crate) parent: Option<TypeIndex>,
    pub(crate) nested: Vec<TypeIndex>,
    /// Ordinary members first, extension members from `extns_start` on.
    pub(crate) members: Vec<MemberIndex>,
    pub(crate) extns_start: usize,
    /// Reserved ranges first, extension ranges from `ranges_extn_start` on.
    pub(crate) ranges: Vec<RangeIndex>,
    pub(crate) ranges_extn_start: usize,
    pub(crate) reserved_names: Vec<ReservedNameIndex>,
    pub(crate) oneofs: Vec<OneofIndex>,
    pub(crate) options: Option<MessageValueIndex>,
    pub(crate) allow_alias: bool,
    pub(crate) deprecated: bool,
    by_name: OnceCell<HashMap<InternId, MemberIndex>>,
}

impl RawType {
    pub(crate) fn new(
        ast: AstRef,
        name: InternId,
        fqn: InternId,
        kind: TypeKind,
        parent: Option<TypeIndex>,
    ) -> RawType {
        RawType {
            ast,
            name,
            fqn,
            kind,
            parent,
            nested: Vec::new(),
            members: Vec::new(),
            extns_start: 0,
            ranges: Vec::new(),
            ranges_extn_start: 0,
            reserved_names: Vec::new(),
            oneofs: Vec::new(),
            options: None,
            allow_alias: false,
            deprecated: false,
            by_name: OnceCell::new(),
        }
    }

    pub(crate) fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum)
    }

    pub(crate) fn is_message(&self) -> bool {
        matches!(self.kind, TypeKind::Message)
    }

    pub(crate) fn fields(&self) -> &[MemberIndex] {
        &self.members[..self.extns_start]
    }

    pub(crate) fn extensions(&self) -> &[MemberIndex] {
        &self.members[self.extns_start..]
    }

    pub(crate) fn reserved_ranges(&self) -> &[RangeIndex] {
        &self.ranges[..self.ranges_extn_start]
    }

    pub(crate) fn extension_ranges(&self) -> &[RangeIndex] {
        &self.ranges[self.ranges_extn_start..]
    }
}

/// A message field, extension field, or enum value.
#[derive(Debug)]
pub(crate) struct RawMember {
    pub(crate) ast: AstRef,
    pub(crate) name: InternId,
    pub(crate) fqn: InternId,
    pub(crate) number: i32,
    /// The enclosing type; `None` for members of a file-level extend block.
    pub(crate) parent: Option<TypeIndex>,
    /// The message that carries the member on the wire: the parent for
    /// ordinary fields, the extendee for extensions. `None` for enum values
    /// and until extendees resolve.
    pub(crate) container: Option<TypeRef>,
    /// The element type; `None` for enum values and unresolved fields.
    pub(crate) elem: Option<TypeRef>,
    /// Oneof index or negated presence; see [`RawMember::oneof_index`].
    slot: i32,
    pub(crate) is_extension: bool,
    pub(crate) is_group: bool,
    pub(crate) is_map_key: bool,
    pub(crate) options: Option<MessageValueIndex>,
    pub(crate) pseudo: PseudoOptions,
    pub(crate) deprecated: bool,
    /// Allowed sites when this member is used as a custom option field,
    /// from `FieldOptions.targets` on its own options.
    pub(crate) targets: Vec<OptionTarget>,
}

impl RawMember {
    pub(crate) fn new(
        ast: AstRef,
        name: InternId,
        fqn: InternId,
        number: i32,
        parent: Option<TypeIndex>,
    ) -> RawMember {
        RawMember {
            ast,
            name,
            fqn,
            number,
            parent,
            container: None,
            elem: None,
            slot: -(Presence::Implicit as i32),
            is_extension: false,
            is_group: false,
            is_map_key: false,
            options: None,
            pseudo: PseudoOptions::default(),
            deprecated: false,
            targets: Vec::new(),
        }
    }

    /// The oneof the member belongs to, if any. The slot stores the oneof
    /// index biased by one so index zero stays distinguishable from the
    /// negated presence encoding.
    pub(crate) fn oneof_index(&self) -> Option<OneofIndex> {
        if self.slot > 0 {
            Some(OneofIndex(self.slot as u32 - 1))
        } else {
            None
        }
    }

    pub(crate) fn set_oneof(&mut self, oneof: OneofIndex) {
        self.slot = oneof.0 as i32 + 1;
    }

    pub(crate) fn presence(&self) -> Presence {
        match -self.slot {
            _ if self.slot > 0 => Presence::Explicit,
            x if x == Presence::Implicit as i32 => Presence::Implicit,
            x if x == Presence::Explicit as i32 => Presence::Explicit,
            x if x == Presence::Required as i32 => Presence::Required,
            x if x == Presence::Repeated as i32 => Presence::Repeated,
            _ => Presence::Implicit,
        }
    }

    pub(crate) fn set_presence(&mut self, presence: Presence) {
        self.slot = -(presence as i32);
    }

    pub(crate) fn is_repeated(&self) -> bool {
        self.presence() == Presence::Repeated
    }
}

/// `default` and `json_name` look like options in source but live outside
/// the options value tree.
#[derive(Debug, Default)]
pub(crate) struct PseudoOptions {
    pub(crate) default_value: Option<ValueIndex>,
    pub(crate) json_name: Option<(InternId, Span)>,
}

#[derive(Debug)]
pub(crate) struct RawOneof {
    pub(crate) ast: AstRef,
    pub(crate) name: InternId,
    pub(crate) fqn: InternId,
    pub(crate) members: Vec<MemberIndex>,
    pub(crate) options: Option<MessageValueIndex>,
    pub(crate) containing: TypeIndex,
    pub(crate) index: u32,
}

#[derive(Debug)]
pub(crate) struct RawExtend {
    pub(crate) ast: AstRef,
    /// Resolved extendee; `None` until resolution or on failure.
    pub(crate) extendee: Option<TypeRef>,
    pub(crate) parent: Option<TypeIndex>,
    pub(crate) members: Vec<MemberIndex>,
}

/// A reserved or extension range, `[first, last]` inclusive as written.
#[derive(Debug)]
pub(crate) struct RawRange {
    pub(crate) ast: AstRef,
    pub(crate) parent: TypeIndex,
    pub(crate) first: i32,
    pub(crate) last: i32,
    pub(crate) options: Option<MessageValueIndex>,
}

#[derive(Debug)]
pub(crate) struct RawReservedName {
    pub(crate) ast: AstRef,
    pub(crate) name: InternId,
}

#[derive(Debug)]
pub(crate) struct RawService {
    pub(crate) ast: AstRef,
    pub(crate) name: InternId,
    pub(crate) fqn: InternId,
    pub(crate) methods: Vec<MethodIndex>,
    pub(crate) options: Option<MessageValueIndex>,
}

#[derive(Debug)]
pub(crate) struct RawMethod {
    pub(crate) ast: AstRef,
    pub(crate) name: InternId,
    pub(crate) fqn: InternId,
    pub(crate) parent: ServiceIndex,
    pub(crate) input: Option<TypeRef>,
    pub(crate) output: Option<TypeRef>,
    pub(crate) client_streaming: bool,
    pub(crate) server_streaming: bool,
    pub(crate) options: Option<MessageValueIndex>,
}

/// The sealed per-file state: arenas, tables and source metadata.
pub(crate) struct FileInner {
    /// Canonical path, the session-wide identity of the file.
    pub(crate) path: String,
    /// The path string as the user referred to the file.
    pub(crate) original_path: String,
    pub(crate) syntax: Syntax,
    pub(crate) syntax_unspecified: bool,
    pub(crate) syntax_ast: Option<AstRef>,
    pub(crate) package: InternId,
    pub(crate) package_ast: Option<AstRef>,
    pub(crate) span: Span,

    pub(crate) types: Vec<RawType>,
    pub(crate) members: Vec<RawMember>,
    pub(crate) oneofs: Vec<RawOneof>,
    pub(crate) extends: Vec<RawExtend>,
    pub(crate) ranges: Vec<RawRange>,
    pub(crate) reserved_names: Vec<RawReservedName>,
    pub(crate) services: Vec<RawService>,
    pub(crate) methods: Vec<RawMethod>,
    pub(crate) values: Vec<Value>,
    pub(crate) message_values: Vec<MessageValue>,
    /// Element words of repeated option values with two or more entries.
    pub(crate) value_slices: Vec<Vec<u64>>,

    pub(crate) top_types: Vec<TypeIndex>,
    pub(crate) top_extends: Vec<ExtendIndex>,
    pub(crate) top_services: Vec<ServiceIndex>,
    pub(crate) options: Option<MessageValueIndex>,

    pub(crate) imports: ImportTable,
    pub(crate) exported: SymbolTable,
    pub(crate) imported: SymbolTable,
    pub(crate) comments: CommentMap,
}

impl FileInner {
    pub(crate) fn new(path: String, original_path: String) -> FileInner {
        FileInner {
            path,
            original_path,
            syntax: Syntax::Proto2,
            syntax_unspecified: false,
            syntax_ast: None,
            package: InternId::EMPTY,
            package_ast: None,
            span: Span::default(),
            types: Vec::new(),
            members: Vec::new(),
            oneofs: Vec::new(),
            extends: Vec::new(),
            ranges: Vec::new(),
            reserved_names: Vec::new(),
            services: Vec::new(),
            methods: Vec::new(),
            values: Vec::new(),
            message_values: Vec::new(),
            value_slices: Vec::new(),
            top_types: Vec::new(),
            top_extends: Vec::new(),
            top_services: Vec::new(),
            options: None,
            imports: ImportTable::default(),
            exported: SymbolTable::default(),
            imported: SymbolTable::default(),
            comments: CommentMap::default(),
        }
    }

    pub(crate) fn type_(&self, index: TypeIndex) -> &RawType {
        &self.types[index.index()]
    }

    pub(crate) fn member(&self, index: MemberIndex) -> &RawMember {
        &self.members[index.index()]
    }

    pub(crate) fn oneof(&self, index: OneofIndex) -> &RawOneof {
        &self.oneofs[index.index()]
    }

    pub(crate) fn range(&self, index: RangeIndex) -> &RawRange {
        &self.ranges[index.index()]
    }

    pub(crate) fn service(&self, index: ServiceIndex) -> &RawService {
        &self.services[index.index()]
    }

    pub(crate) fn method(&self, index: MethodIndex) -> &RawMethod {
        &self.methods[index.index()]
    }

    pub(crate) fn value(&self, index: ValueIndex) -> &Value {
        &self.values[index.index()]
    }

    pub(crate) fn message_value(&self, index: MessageValueIndex) -> &MessageValue {
        &self.message_values[index.index()]
    }

    /// The elements of a value: the spilled slice, or the single inline word.
    pub(crate) fn value_elems(&self, value: &Value) -> Vec<u64> {
        match value.slice_index() {
            Some(slice) => self.value_slices[slice.0 as usize].clone(),
            None => vec![value.bits()],
        }
    }

    /// The file another file's entity reference resolves against.
    pub(crate) fn file_for(&self, session: &Session, slot: FileSlot) -> Arc<FileInner> {
        match slot {
            FileSlot::PREDECLARED => session.shared.predeclared.clone(),
            _ => self.imports.file(slot),
        }
    }

    /// Lazily built member-by-name map of a type; safe to race from
    /// multiple importing files.
    pub(crate) fn member_by_name(&self, ty: TypeIndex, name: InternId) -> Option<MemberIndex> {
        let raw = self.type_(ty);
        let map = raw.by_name.get_or_init(|| {
            raw.members
                .iter()
                .map(|&member| (self.member(member).name, member))
                .collect()
        });
        map.get(&name).copied()
    }

    pub(crate) fn is_descriptor(&self) -> bool {
        self.path == builtin::DESCRIPTOR_PATH
    }
}

/// A file reached from another file's entity reference. Local references
/// borrow; cross-file references clone the shared handle.
pub(crate) enum FileRef<'a> {
    Local(&'a FileInner),
    Shared(Arc<FileInner>),
}

impl<'a> FileRef<'a> {
    pub(crate) fn get(&self) -> &FileInner {
        match self {
            FileRef::Local(inner) => inner,
            FileRef::Shared(inner) => inner,
        }
    }
}

pub(crate) fn resolve_slot<'a>(
    session: &Session,
    local: &'a FileInner,
    slot: FileSlot,
) -> FileRef<'a> {
    match slot {
        FileSlot::LOCAL => FileRef::Local(local),
        FileSlot::PREDECLARED => FileRef::Shared(session.shared.predeclared.clone()),
        _ => FileRef::Shared(local.imports.file(slot)),
    }
}

impl fmt::Debug for FileInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInner")
            .field("path", &self.path)
            .field("syntax", &self.syntax)
            .finish_non_exhaustive()
    }
}

/// Process-wide state: the intern pool and the synthetic builtin files.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct Session {
    pub(crate) shared: Arc<SessionShared>,
}

pub(crate) struct SessionShared {
    pub(crate) interner: Interner,
    /// Synthetic file holding the scalar types, shared by every file.
    pub(crate) predeclared: Arc<FileInner>,
    /// The resolved `google.protobuf` descriptor builtins.
    pub(crate) descriptor: Arc<FileInner>,
}

impl Session {
    pub fn new() -> Session {
        let interner = Interner::new();
        let predeclared = Arc::new(builtin::predeclared_file(&interner));
        let descriptor = Arc::new(builtin::descriptor_file(&interner));
        Session {
            shared: Arc::new(SessionShared {
                interner,
                predeclared,
                descriptor,
            }),
        }
    }

    pub(crate) fn interner(&self) -> &Interner {
        &self.shared.interner
    }

    /// The builtin `google.protobuf` descriptor file.
    pub fn descriptor_file(&self) -> File {
        File {
            session: self.clone(),
            inner: self.shared.descriptor.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// A lowered, sealed `.proto` file.
#[derive(Clone)]
pub struct File {
    pub(crate) session: Session,
    pub(crate) inner: Arc<FileInner>,
}

impl File {
    /// Canonical path of the file within the session.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn syntax(&self) -> Syntax {
        self.inner.syntax
    }

    /// Dot-separated package, empty when the file declares none.
    pub fn package(&self) -> Arc<str> {
        self.session.interner().get(self.inner.package)
    }

    /// The files this file transitively imports, with their re-export flag,
    /// in import-table order.
    pub fn transitive_imports(&self) -> Vec<(String, bool)> {
        self.inner
            .imports
            .entries()
            .iter()
            .map(|entry| (entry.file.path.clone(), entry.is_public_reexport()))
            .collect()
    }
}

impl PartialEq for File {
    fn eq(&self, other: &File) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for File {}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File").field("path", &self.inner.path).finish()
    }
}

#[test]
fn assert_handles_send_sync() {
    fn test_send_sync<T: Send + Sync>() {}

    test_send_sync::<Session>();
    test_send_sync::<File>();
}
