//! The AST and token-stream contract consumed by the lowering pipeline.
//!
//! The parser lives outside this crate; it hands over one [`SourceFile`] per
//! `.proto` file, already legalized at the syntax level (balanced bodies,
//! merged adjacent string literals, lowered `map<..>` fields). Nodes that the
//! parser could not recover carry `corrupt: true` and are skipped silently by
//! the walker.
//!
//! All locations are zero-based. Every node records a [`Span`] and the index
//! of its first token so comments can be attributed to it.

/// Index of a token within [`SourceFile::tokens`].
pub type TokenId = u32;

/// A zero-based source position.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Loc {
    /// Byte offset from the start of the file.
    pub offset: u32,
    pub line: u32,
    pub col: u32,
}

/// A half-open source region, `start` inclusive, `end` exclusive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: Loc,
    pub end: Loc,
}

impl Span {
    pub fn between(start: Span, end: Span) -> Span {
        Span {
            start: start.start,
            end: end.end,
        }
    }
}

/// One lexed token. The stream includes whitespace and comment tokens; the
/// comment tracker is the only consumer that cares about them.
///
/// Line-comment tokens end before their terminating newline; the newline
/// belongs to the following whitespace token. Comment attribution counts on
/// that split.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Verbatim source text, including comment delimiters.
    pub text: Box<str>,
    pub span: Span,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    #[default]
    Ident,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    Punct,
    LineComment,
    BlockComment,
    Whitespace,
}

impl TokenKind {
    /// Tokens that never receive comment attribution.
    pub fn is_skippable(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment | TokenKind::BlockComment | TokenKind::Whitespace
        )
    }
}

/// A parsed `.proto` file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceFile {
    /// The path exactly as the caller referred to the file.
    pub path: String,
    /// `None` when the file has no `syntax`/`edition` declaration, which
    /// defaults to proto2 and is surfaced through the emitter's file info.
    pub syntax: Option<SyntaxDecl>,
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub options: Vec<OptionDecl>,
    pub decls: Vec<Decl>,
    pub tokens: Vec<Token>,
    pub span: Span,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SyntaxDecl {
    pub syntax: Syntax,
    pub span: Span,
    pub token: TokenId,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
    /// `edition = "2023"` and onwards; the payload is the edition year.
    Edition(u16),
}

impl Syntax {
    pub fn is_editions(self) -> bool {
        matches!(self, Syntax::Edition(_))
    }

    pub fn edition(self) -> Option<u16> {
        match self {
            Syntax::Edition(year) => Some(year),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PackageDecl {
    /// Dot-separated package path, without a leading dot.
    pub name: String,
    pub span: Span,
    pub token: TokenId,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportDecl {
    /// The import path string exactly as written.
    pub path: String,
    pub kind: ImportKind,
    pub span: Span,
    pub token: TokenId,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    #[default]
    Default,
    Public,
    Weak,
    /// `import option "..."` (Edition 2024).
    Option,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Message(MessageDecl),
    Enum(EnumDecl),
    Extend(ExtendDecl),
    Service(ServiceDecl),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ident {
    pub text: String,
    pub span: Span,
    pub token: TokenId,
}

impl Ident {
    pub fn new(text: &str) -> Ident {
        Ident {
            text: text.to_owned(),
            ..Default::default()
        }
    }
}

/// A possibly-qualified type reference, e.g. `int32`, `Bar.Baz`, `.foo.Bar`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    pub span: Span,
    pub token: TokenId,
}

impl TypeName {
    pub fn new(name: &str) -> TypeName {
        TypeName {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.name.starts_with('.')
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageDecl {
    pub name: Ident,
    pub items: Vec<MessageItem>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageItem {
    Field(FieldDecl),
    Group(GroupDecl),
    Oneof(OneofDecl),
    Message(MessageDecl),
    Enum(EnumDecl),
    Extend(ExtendDecl),
    /// An `extensions 5, 100 to max;` declaration.
    Extensions(ExtensionsDecl),
    Reserved(ReservedDecl),
    Option(OptionDecl),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LabelDecl {
    pub label: Label,
    pub span: Span,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldDecl {
    pub label: Option<LabelDecl>,
    pub ty: TypeName,
    pub name: Ident,
    pub number: IntLit,
    /// Bracket options, including the `default` / `json_name` pseudo-options.
    pub options: Vec<OptionDecl>,
    /// Set by the external map-field lowering on the key field of a synthetic
    /// map entry; constrains the resolved type to the map-key family.
    pub is_map_key: bool,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

/// A proto2 `group` field; declares both a nested message and a field.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GroupDecl {
    pub label: Option<LabelDecl>,
    /// Capitalized group name; the synthesized field uses its lowercase form.
    pub name: Ident,
    pub number: IntLit,
    pub options: Vec<OptionDecl>,
    pub items: Vec<MessageItem>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OneofDecl {
    pub name: Ident,
    pub items: Vec<OneofItem>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OneofItem {
    Field(FieldDecl),
    Group(GroupDecl),
    Option(OptionDecl),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub items: Vec<EnumItem>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumItem {
    Value(EnumValueDecl),
    Reserved(ReservedDecl),
    Option(OptionDecl),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnumValueDecl {
    pub name: Ident,
    pub number: IntLit,
    pub options: Vec<OptionDecl>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtendDecl {
    pub extendee: TypeName,
    pub items: Vec<ExtendItem>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtendItem {
    Field(FieldDecl),
    Group(GroupDecl),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ServiceDecl {
    pub name: Ident,
    pub items: Vec<ServiceItem>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceItem {
    Method(MethodDecl),
    Option(OptionDecl),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: Ident,
    pub input: RpcType,
    pub output: RpcType,
    pub options: Vec<OptionDecl>,
    pub span: Span,
    pub token: TokenId,
    pub corrupt: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RpcType {
    pub stream: bool,
    pub ty: TypeName,
    pub span: Span,
}

/// One `extensions ...;` declaration; ranges are inclusive as written.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtensionsDecl {
    pub ranges: Vec<TagRangeDecl>,
    pub options: Vec<OptionDecl>,
    pub span: Span,
    pub token: TokenId,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReservedDecl {
    pub ranges: Vec<TagRangeDecl>,
    pub names: Vec<Ident>,
    pub span: Span,
    pub token: TokenId,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TagRangeDecl {
    pub start: i32,
    /// `None` means a single-number range; `i32::MAX` encodes `max`.
    pub end: Option<i32>,
    pub span: Span,
}

impl TagRangeDecl {
    pub fn last(&self) -> i32 {
        self.end.unwrap_or(self.start)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OptionDecl {
    pub path: Vec<OptionNamePart>,
    pub value: OptionValue,
    pub span: Span,
    pub token: TokenId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionNamePart {
    /// A plain field-name component.
    Ident(Ident),
    /// A parenthesized extension component, `(foo.bar)` or `(.foo.bar)`.
    Extension(TypeName),
}

impl OptionNamePart {
    pub fn span(&self) -> Span {
        match self {
            OptionNamePart::Ident(ident) => ident.span,
            OptionNamePart::Extension(name) => name.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// An identifier: an enum value name, `true`/`false`, `inf`/`nan`.
    Ident(Ident),
    Int(IntLit),
    Float(FloatLit),
    /// String contents with escapes already processed; not necessarily UTF-8.
    Str(StrLit),
    List(ListLit),
    Message(MessageLit),
}

impl Default for OptionValue {
    fn default() -> OptionValue {
        OptionValue::Ident(Ident::default())
    }
}

impl OptionValue {
    pub fn span(&self) -> Span {
        match self {
            OptionValue::Ident(v) => v.span,
            OptionValue::Int(v) => v.span,
            OptionValue::Float(v) => v.span,
            OptionValue::Str(v) => v.span,
            OptionValue::List(v) => v.span,
            OptionValue::Message(v) => v.span,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct IntLit {
    /// Magnitude of the literal; the sign lives in `negative` so that
    /// `-9223372036854775808` and `18446744073709551615` both round-trip.
    pub value: u64,
    pub negative: bool,
    pub span: Span,
}

impl IntLit {
    pub fn new(value: i64) -> IntLit {
        IntLit {
            value: value.unsigned_abs(),
            negative: value < 0,
            ..Default::default()
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        if self.negative {
            if self.value <= (i64::MAX as u64) + 1 {
                Some((self.value as i64).wrapping_neg())
            } else {
                None
            }
        } else {
            i64::try_from(self.value).ok()
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        if self.negative {
            None
        } else {
            Some(self.value)
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FloatLit {
    pub value: f64,
    pub negative: bool,
    pub span: Span,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StrLit {
    pub value: Vec<u8>,
    pub span: Span,
}

impl StrLit {
    pub fn new(value: &str) -> StrLit {
        StrLit {
            value: value.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListLit {
    pub elems: Vec<OptionValue>,
    pub span: Span,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageLit {
    pub fields: Vec<MessageLitField>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageLitField {
    pub name: MessageLitFieldName,
    pub value: OptionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageLitFieldName {
    Ident(Ident),
    /// `[foo.bar.ext]` — an extension field.
    Extension(TypeName),
    /// `[type.googleapis.com/foo.Bar]` — an `Any` expansion.
    AnyTypeUrl {
        prefix: String,
        name: TypeName,
        span: Span,
    },
}

impl MessageLitFieldName {
    pub fn span(&self) -> Span {
        match self {
            MessageLitFieldName::Ident(ident) => ident.span,
            MessageLitFieldName::Extension(name) => name.span,
            MessageLitFieldName::AnyTypeUrl { span, .. } => *span,
        }
    }
}

/// Source coordinates the IR keeps for each entity after the AST is dropped:
/// enough to point diagnostics, emit spans, and attribute comments.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AstRef {
    pub span: Span,
    pub token: TokenId,
}

impl AstRef {
    pub fn new(span: Span, token: TokenId) -> AstRef {
        AstRef { span, token }
    }
}
