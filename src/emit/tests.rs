use prost::Message;
use similar_asserts::assert_eq;

use crate::{
    ast::{
        Decl, EnumItem, FloatLit, Ident, ImportKind, IntLit, Label as AstLabel, ListLit, Loc,
        MessageItem, MessageLit, MessageLitField, MessageLitFieldName, OptionValue, ReservedDecl,
        Span, StrLit, Syntax, TagRangeDecl, Token, TokenKind,
    },
    emit::EmitOptions,
    testutil::*,
};

fn decode(bytes: &[u8]) -> prost_types::FileDescriptorProto {
    prost_types::FileDescriptorProto::decode(bytes).expect("emitted bytes must decode")
}

#[test]
fn proto3_explicit_optional_synthesizes_oneof() {
    let mut fixture = Fixture::new();
    let mut ast = source("m.proto", Syntax::Proto3);
    ast.decls.push(message(
        "M",
        vec![
            MessageItem::Field(labeled(AstLabel::Optional, "int32", "x", 1)),
            MessageItem::Field(field("int32", "y", 2)),
        ],
    ));
    let file = fixture.lower(ast);
    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);

    let proto = decode(&file.descriptor_proto_bytes(&EmitOptions::default()));
    let m = &proto.message_type[0];

    let x = &m.field[0];
    assert_eq!(x.name(), "x");
    assert_eq!(x.number(), 1);
    assert_eq!(x.r#type(), prost_types::field_descriptor_proto::Type::Int32);
    assert_eq!(
        x.label(),
        prost_types::field_descriptor_proto::Label::Optional
    );
    assert_eq!(x.oneof_index, Some(0));
    assert_eq!(x.proto3_optional, Some(true));

    let y = &m.field[1];
    assert_eq!(y.name(), "y");
    assert_eq!(y.oneof_index, None);
    assert_eq!(y.proto3_optional, None);

    let oneof_names: Vec<&str> = m.oneof_decl.iter().map(|o| o.name()).collect();
    assert_eq!(oneof_names, vec!["_x"]);
}

#[test]
fn packed_repeated_varint_option_bytes() {
    let mut fixture = Fixture::new();
    let mut ast = source("packed.proto", Syntax::Proto3);
    ast.decls.push(message(
        "POpts",
        vec![MessageItem::Field(labeled(
            AstLabel::Repeated,
            "int32",
            "v",
            1,
        ))],
    ));
    ast.decls.push(extend(
        "google.protobuf.FileOptions",
        vec![labeled(AstLabel::Optional, "POpts", "po", 50_000)],
    ));
    ast.options.push(ext_option(
        "po",
        OptionValue::Message(MessageLit {
            fields: vec![MessageLitField {
                name: MessageLitFieldName::Ident(Ident::new("v")),
                value: OptionValue::List(ListLit {
                    elems: vec![int_value(1), int_value(2), int_value(300)],
                    ..Default::default()
                }),
            }],
            ..Default::default()
        }),
    ));
    let file = fixture.lower(ast);
    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);

    let proto = file.descriptor_proto(&EmitOptions::default());
    let encoded = &proto.options.as_ref().expect("file options").encoded;
    // tag 50000 wrapping { v: [1, 2, 300] } in packed form.
    assert_eq!(
        encoded,
        &vec![0x82, 0xb5, 0x18, 0x06, 0x0a, 0x04, 0x01, 0x02, 0xac, 0x02]
    );
    // The inner message is exactly the packed sequence from the wire spec.
    assert_eq!(&encoded[4..], &[0x0a, 0x04, 0x01, 0x02, 0xac, 0x02]);
}

#[test]
fn default_values_use_protoc_string_forms() {
    let mut fixture = Fixture::new();
    let mut ast = source("defaults.proto", Syntax::Proto2);

    let with_default = |ty: &str, name: &str, number: i64, value: OptionValue| {
        let mut f = labeled(AstLabel::Optional, ty, name, number);
        f.options = vec![plain_option("default", value)];
        MessageItem::Field(f)
    };

    ast.decls.push(message(
        "D",
        vec![
            with_default("double", "pos_inf", 1, ident_value("inf")),
            with_default(
                "double",
                "neg_inf",
                2,
                OptionValue::Float(FloatLit {
                    value: f64::INFINITY,
                    negative: true,
                    span: Span::default(),
                }),
            ),
            with_default("double", "not_a_number", 3, ident_value("nan")),
            with_default(
                "double",
                "plain",
                4,
                OptionValue::Float(FloatLit {
                    value: 1.5,
                    negative: false,
                    span: Span::default(),
                }),
            ),
            with_default("string", "greeting", 5, OptionValue::Str(StrLit::new("hi"))),
            with_default("bool", "flag", 6, ident_value("true")),
            with_default("int32", "offset", 7, OptionValue::Int(IntLit::new(-7))),
        ],
    ));
    let file = fixture.lower(ast);
    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);

    let proto = decode(&file.descriptor_proto_bytes(&EmitOptions::default()));
    let defaults: Vec<&str> = proto.message_type[0]
        .field
        .iter()
        .map(|f| f.default_value())
        .collect();
    assert_eq!(
        defaults,
        vec!["inf", "-inf", "nan", "1.5", "hi", "true", "-7"]
    );
}

#[test]
fn range_ends_follow_descriptor_quirks() {
    let mut fixture = Fixture::new();
    let mut ast = source("ranges.proto", Syntax::Proto2);
    ast.decls.push(message(
        "M",
        vec![MessageItem::Extensions(crate::ast::ExtensionsDecl {
            ranges: vec![TagRangeDecl {
                start: 100,
                end: Some(200),
                ..Default::default()
            }],
            ..Default::default()
        })],
    ));
    let mut e = enum_decl("E", &[("E_ZERO", 0)]);
    e.items.push(EnumItem::Reserved(ReservedDecl {
        ranges: vec![TagRangeDecl {
            start: 1,
            end: Some(3),
            ..Default::default()
        }],
        ..Default::default()
    }));
    ast.decls.push(Decl::Enum(e));
    let file = fixture.lower(ast);
    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);

    let proto = decode(&file.descriptor_proto_bytes(&EmitOptions::default()));

    // Message extension ranges store an exclusive end.
    let ext_range = &proto.message_type[0].extension_range[0];
    assert_eq!(ext_range.start, Some(100));
    assert_eq!(ext_range.end, Some(201));

    // Enum reserved ranges store an inclusive end.
    let reserved = &proto.enum_type[0].reserved_range[0];
    assert_eq!(reserved.start, Some(1));
    assert_eq!(reserved.end, Some(3));
}

#[test]
fn imports_emit_in_source_order() {
    let mut fixture = Fixture::new();
    fixture.lower(source("a.proto", Syntax::Proto3));
    fixture.lower(source("b.proto", Syntax::Proto3));

    // The import table reorders publics first; the emitted dependency list
    // must follow the written order instead.
    let mut ast = source("main.proto", Syntax::Proto3);
    let mut regular = import("b.proto", ImportKind::Default);
    regular.span = span_at(10);
    let mut public = import("a.proto", ImportKind::Public);
    public.span = span_at(20);
    ast.imports.push(regular);
    ast.imports.push(public);
    let file = fixture.lower(ast);

    let proto = decode(&file.descriptor_proto_bytes(&EmitOptions::default()));
    assert_eq!(proto.dependency, vec!["b.proto", "a.proto"]);
    assert_eq!(proto.public_dependency, vec![1]);
    assert!(proto.weak_dependency.is_empty());
}

#[test]
fn builtin_options_round_trip_through_prost() {
    let mut fixture = Fixture::new();
    let mut ast = source("opts.proto", Syntax::Proto3);
    ast.options
        .push(plain_option("java_package", str_value("com.example")));
    let mut m = message_decl("M", vec![]);
    m.items
        .push(MessageItem::Option(plain_option("deprecated", ident_value("true"))));
    ast.decls.push(Decl::Message(m));
    let file = fixture.lower(ast);
    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);

    let proto = decode(&file.descriptor_proto_bytes(&EmitOptions::default()));
    assert_eq!(
        proto.options.as_ref().unwrap().java_package(),
        "com.example"
    );
    assert_eq!(
        proto.message_type[0].options.as_ref().unwrap().deprecated,
        Some(true)
    );
}

#[test]
fn source_code_info_is_sorted_with_whole_file_prefix() {
    let mut fixture = Fixture::new();
    let mut ast = source("sci.proto", Syntax::Proto3);
    ast.tokens = vec![
        Token {
            kind: TokenKind::LineComment,
            text: "// a message".into(),
            span: Span::default(),
        },
        Token {
            kind: TokenKind::Whitespace,
            text: "\n".into(),
            span: Span::default(),
        },
        Token {
            kind: TokenKind::Ident,
            text: "message".into(),
            span: Span::default(),
        },
    ];
    ast.span = Span {
        start: Loc {
            offset: 0,
            line: 0,
            col: 0,
        },
        end: Loc {
            offset: 40,
            line: 3,
            col: 0,
        },
    };

    let mut m = message_decl(
        "M",
        vec![MessageItem::Field(field("int32", "x", 1))],
    );
    m.span = Span {
        start: Loc {
            offset: 14,
            line: 1,
            col: 0,
        },
        end: Loc {
            offset: 38,
            line: 2,
            col: 1,
        },
    };
    m.token = 2;
    if let MessageItem::Field(f) = &mut m.items[0] {
        f.span = Span {
            start: Loc {
                offset: 28,
                line: 1,
                col: 14,
            },
            end: Loc {
                offset: 36,
                line: 1,
                col: 22,
            },
        };
    }
    ast.decls.push(Decl::Message(m));
    let file = fixture.lower(ast);

    let options = EmitOptions {
        include_source_info: true,
        exclude: None,
    };
    let proto = decode(&file.descriptor_proto_bytes(&options));
    let info = proto.source_code_info.expect("source code info");

    // Whole-file location first, then spans in order.
    assert!(info.location[0].path.is_empty());
    assert_eq!(info.location[0].span, vec![0, 0, 3, 0]);
    let spans: Vec<&[i32]> = info.location[1..]
        .iter()
        .map(|l| l.span.as_slice())
        .collect();
    let mut sorted = spans.clone();
    sorted.sort();
    assert_eq!(spans, sorted);

    let message_location = info
        .location
        .iter()
        .find(|l| l.path == [4, 0])
        .expect("message location");
    assert_eq!(message_location.span, vec![1, 0, 2, 1]);
    assert_eq!(message_location.leading_comments(), " a message\n");

    let field_location = info
        .location
        .iter()
        .find(|l| l.path == [4, 0, 2, 0])
        .expect("field location");
    assert_eq!(field_location.span, vec![1, 14, 22]);
}

#[test]
fn file_info_extension_reports_unused_imports() {
    let mut fixture = Fixture::new();
    fixture.lower(source("a.proto", Syntax::Proto3));

    let mut ast = crate::ast::SourceFile {
        path: "nosyntax.proto".to_owned(),
        ..Default::default()
    };
    ast.imports.push(import("a.proto", ImportKind::Default));
    let file = fixture.lower(ast);

    let options = EmitOptions {
        include_source_info: true,
        exclude: None,
    };
    let proto = file.descriptor_proto(&options);
    let info = proto.file_info.expect("file info");
    assert_eq!(info.is_syntax_unspecified, Some(true));
    assert_eq!(info.unused_dependency, vec![0]);

    // Without source info the private extension stays out of the bytes.
    let plain = file.descriptor_proto(&EmitOptions::default());
    assert!(plain.file_info.is_none());
}

#[test]
fn descriptor_set_excludes_and_sorts() {
    let mut fixture = Fixture::new();
    let a = fixture.lower(source("a.proto", Syntax::Proto3));
    let b = fixture.lower(source("b.proto", Syntax::Proto3));

    let exclude = |file: &crate::File| file.path() == "a.proto";
    let options = EmitOptions {
        include_source_info: false,
        exclude: Some(&exclude),
    };
    let bytes = crate::descriptor_set_bytes(&[a, b], &options);
    let set = prost_types::FileDescriptorSet::decode(&bytes[..]).unwrap();
    let names: Vec<&str> = set.file.iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["b.proto"]);
}

#[test]
fn edition_files_use_the_edition_field() {
    let mut fixture = Fixture::new();
    let file = fixture.lower(source("ed.proto", Syntax::Edition(2023)));

    let proto = file.descriptor_proto(&EmitOptions::default());
    assert_eq!(proto.syntax.as_deref(), Some("editions"));
    assert_eq!(proto.edition, Some(1000));
}

#[test]
fn unknown_option_bytes_survive_a_decode_round_trip() {
    // Custom options decode as unknown fields of the options message; the
    // copier must preserve them byte for byte through decode and re-encode.
    let mut fixture = Fixture::new();
    let mut ast = source("roundtrip.proto", Syntax::Proto3);
    ast.decls.push(message(
        "POpts",
        vec![
            MessageItem::Field(labeled(AstLabel::Repeated, "int32", "v", 1)),
            MessageItem::Field(labeled(AstLabel::Optional, "string", "s", 2)),
        ],
    ));
    ast.decls.push(extend(
        "google.protobuf.FileOptions",
        vec![labeled(AstLabel::Optional, "POpts", "po", 50_000)],
    ));
    ast.options.push(ext_option(
        "po",
        OptionValue::Message(MessageLit {
            fields: vec![
                MessageLitField {
                    name: MessageLitFieldName::Ident(Ident::new("v")),
                    value: OptionValue::List(ListLit {
                        elems: vec![int_value(1), int_value(300)],
                        ..Default::default()
                    }),
                },
                MessageLitField {
                    name: MessageLitFieldName::Ident(Ident::new("s")),
                    value: str_value("x"),
                },
            ],
            ..Default::default()
        }),
    ));
    let file = fixture.lower(ast);
    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);

    let proto = file.descriptor_proto(&EmitOptions::default());
    let bytes = file.descriptor_proto_bytes(&EmitOptions::default());
    let decoded = crate::emit::types::FileDescriptorProto::decode(&bytes[..])
        .expect("internal descriptor round trip");
    assert_eq!(
        decoded.options.as_ref().map(|o| &o.encoded),
        proto.options.as_ref().map(|o| &o.encoded)
    );
}

#[test]
fn custom_string_option_encodes_as_extension_field() {
    let mut fixture = Fixture::new();
    let mut ast = source("custom.proto", Syntax::Proto3);
    ast.decls.push(extend(
        "google.protobuf.FieldOptions",
        vec![labeled(AstLabel::Optional, "string", "tag", 50_000)],
    ));
    let mut f = field("string", "s", 1);
    f.options = vec![ext_option("tag", str_value("x"))];
    ast.decls.push(message("M", vec![MessageItem::Field(f)]));
    let file = fixture.lower(ast);
    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);

    let proto = file.descriptor_proto(&EmitOptions::default());
    let encoded = &proto.message_type[0].field[0]
        .options
        .as_ref()
        .expect("field options")
        .encoded;
    // tag 50000, length-delimited, "x".
    assert_eq!(encoded, &vec![0x82, 0xb5, 0x18, 0x01, b'x']);
}
