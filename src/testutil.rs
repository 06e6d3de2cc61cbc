//! Helpers for building AST fixtures in tests.

use std::collections::HashMap;

use crate::{
    ast::{
        Decl, EnumDecl, EnumItem, EnumValueDecl, ExtendDecl, ExtendItem, FieldDecl, Ident,
        ImportDecl, ImportKind, IntLit, Label, LabelDecl, MessageDecl, MessageItem, MethodDecl,
        OptionDecl, OptionNamePart, OptionValue, RpcType, ServiceDecl, ServiceItem, SourceFile,
        Span, StrLit, Syntax, SyntaxDecl, TypeName,
    },
    File, ImportError, Importer, Report, Session,
};

/// Lowers a sequence of files in dependency order and serves them back to
/// later files through the importer callback.
pub(crate) struct Fixture {
    pub(crate) session: Session,
    pub(crate) report: Report,
    files: HashMap<String, File>,
}

impl Fixture {
    pub(crate) fn new() -> Fixture {
        Fixture {
            session: Session::new(),
            report: Report::new(),
            files: HashMap::new(),
        }
    }

    pub(crate) fn lower(&mut self, ast: SourceFile) -> File {
        let path = ast.path.clone();
        let mut importer = MapImporter {
            files: &self.files,
        };
        let file = self.session.lower(ast, &mut importer, &mut self.report);
        self.files.insert(path, file.clone());
        file
    }
}

struct MapImporter<'a> {
    files: &'a HashMap<String, File>,
}

impl Importer for MapImporter<'_> {
    fn import(
        &mut self,
        _index: usize,
        canonical_path: &str,
        _decl: &ImportDecl,
    ) -> Result<File, ImportError> {
        self.files
            .get(canonical_path)
            .cloned()
            .ok_or(ImportError::NotFound)
    }
}

pub(crate) fn source(path: &str, syntax: Syntax) -> SourceFile {
    SourceFile {
        path: path.to_owned(),
        syntax: Some(SyntaxDecl {
            syntax,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn package(file: &mut SourceFile, name: &str) {
    file.package = Some(crate::ast::PackageDecl {
        name: name.to_owned(),
        ..Default::default()
    });
}

pub(crate) fn import(path: &str, kind: ImportKind) -> ImportDecl {
    ImportDecl {
        path: path.to_owned(),
        kind,
        ..Default::default()
    }
}

pub(crate) fn message(name: &str, items: Vec<MessageItem>) -> Decl {
    Decl::Message(message_decl(name, items))
}

pub(crate) fn message_decl(name: &str, items: Vec<MessageItem>) -> MessageDecl {
    MessageDecl {
        name: Ident::new(name),
        items,
        ..Default::default()
    }
}

pub(crate) fn nested(name: &str, items: Vec<MessageItem>) -> MessageItem {
    MessageItem::Message(message_decl(name, items))
}

pub(crate) fn field(ty: &str, name: &str, number: i64) -> FieldDecl {
    FieldDecl {
        ty: TypeName::new(ty),
        name: Ident::new(name),
        number: IntLit::new(number),
        ..Default::default()
    }
}

pub(crate) fn labeled(label: Label, ty: &str, name: &str, number: i64) -> FieldDecl {
    FieldDecl {
        label: Some(LabelDecl {
            label,
            span: Span::default(),
        }),
        ..field(ty, name, number)
    }
}

pub(crate) fn enum_item(name: &str, values: &[(&str, i64)]) -> MessageItem {
    MessageItem::Enum(enum_decl(name, values))
}

pub(crate) fn enum_decl(name: &str, values: &[(&str, i64)]) -> EnumDecl {
    EnumDecl {
        name: Ident::new(name),
        items: values
            .iter()
            .map(|&(value, number)| {
                EnumItem::Value(EnumValueDecl {
                    name: Ident::new(value),
                    number: IntLit::new(number),
                    ..Default::default()
                })
            })
            .collect(),
        ..Default::default()
    }
}

pub(crate) fn extend(extendee: &str, fields: Vec<FieldDecl>) -> Decl {
    Decl::Extend(ExtendDecl {
        extendee: TypeName::new(extendee),
        items: fields.into_iter().map(ExtendItem::Field).collect(),
        ..Default::default()
    })
}

pub(crate) fn service(name: &str, methods: Vec<MethodDecl>) -> Decl {
    Decl::Service(ServiceDecl {
        name: Ident::new(name),
        items: methods.into_iter().map(ServiceItem::Method).collect(),
        ..Default::default()
    })
}

pub(crate) fn method(name: &str, input: &str, output: &str) -> MethodDecl {
    MethodDecl {
        name: Ident::new(name),
        input: RpcType {
            stream: false,
            ty: TypeName::new(input),
            span: Span::default(),
        },
        output: RpcType {
            stream: false,
            ty: TypeName::new(output),
            span: Span::default(),
        },
        ..Default::default()
    }
}

/// `option (name) = value;` with a single extension component.
pub(crate) fn ext_option(name: &str, value: OptionValue) -> OptionDecl {
    OptionDecl {
        path: vec![OptionNamePart::Extension(TypeName::new(name))],
        value,
        ..Default::default()
    }
}

/// `option name = value;` with a single identifier component.
pub(crate) fn plain_option(name: &str, value: OptionValue) -> OptionDecl {
    OptionDecl {
        path: vec![OptionNamePart::Ident(Ident::new(name))],
        value,
        ..Default::default()
    }
}

pub(crate) fn str_value(value: &str) -> OptionValue {
    OptionValue::Str(StrLit::new(value))
}

pub(crate) fn int_value(value: i64) -> OptionValue {
    OptionValue::Int(IntLit::new(value))
}

pub(crate) fn ident_value(value: &str) -> OptionValue {
    OptionValue::Ident(Ident::new(value))
}

/// A span at byte offset `offset`, for tests that assert ordering or
/// "first set here" labels.
pub(crate) fn span_at(offset: u32) -> Span {
    let mut span = Span::default();
    span.start.offset = offset;
    span.end.offset = offset + 1;
    span
}
