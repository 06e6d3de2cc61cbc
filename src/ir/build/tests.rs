use crate::{
    ast::{
        Ident, ImportKind, Label as AstLabel, MessageItem, OneofDecl, OneofItem,
        OptionNamePart, Syntax, TypeName,
    },
    error::DiagnosticKind,
    ir::{resolve_slot, FileSlot},
    testutil::*,
    File,
};

fn member_by_fqn<'a>(file: &'a File, fqn: &str) -> &'a crate::ir::RawMember {
    let id = file.session.interner().probe(fqn).expect("fqn not interned");
    file.inner
        .members
        .iter()
        .find(|member| member.fqn == id)
        .expect("member not found")
}

fn elem_fqn(file: &File, member: &crate::ir::RawMember) -> String {
    let elem = member.elem.expect("member type unresolved");
    let target = resolve_slot(&file.session, &file.inner, elem.file);
    file.session
        .interner()
        .get(target.get().type_(elem.index).fqn)
        .to_string()
}

#[test]
fn resolution_climbs_past_wrong_kind_symbol() {
    // message M { message N {} message P { enum X { N = 1; } N n = 1; } }
    // The enum value N has fqn foo.M.P.N, shadowing the first candidate;
    // the climb must continue to the message foo.M.N.
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto2);
    package(&mut ast, "foo");
    ast.decls.push(message(
        "M",
        vec![
            nested("N", vec![]),
            nested(
                "P",
                vec![
                    enum_item("X", &[("N", 1)]),
                    MessageItem::Field(field("N", "n", 1)),
                ],
            ),
        ],
    ));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let member = member_by_fqn(&file, "foo.M.P.n");
    assert_eq!(elem_fqn(&file, member), "foo.M.N");
}

#[test]
fn partial_name_reports_expected_path() {
    // message M { message N {} message M { M.N n = 1; } }
    // The first component settles on the inner foo.M.M, and the full path
    // foo.M.M.N does not exist; protoc's two-phase behaviour reports the
    // expected path rather than climbing further.
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto2);
    package(&mut ast, "foo");
    ast.decls.push(message(
        "M",
        vec![
            nested("N", vec![]),
            nested("M", vec![MessageItem::Field(field("M.N", "n", 1))]),
        ],
    ));
    fixture.lower(ast);

    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::PartialNameNotFound { expected, .. } if expected == "foo.M.M.N"
    )));
}

#[test]
fn diamond_public_import_classification() {
    // a; i => a; c -> a; j -> c, j => i. The transitive list of j must
    // carry a as public no matter which path reached it first.
    let mut fixture = Fixture::new();
    fixture.lower(source("a.proto", Syntax::Proto2));

    let mut i = source("i.proto", Syntax::Proto2);
    i.imports.push(import("a.proto", ImportKind::Public));
    fixture.lower(i);

    let mut c = source("c.proto", Syntax::Proto2);
    c.imports.push(import("a.proto", ImportKind::Default));
    fixture.lower(c);

    let mut j = source("j.proto", Syntax::Proto2);
    j.imports.push(import("c.proto", ImportKind::Default));
    j.imports.push(import("i.proto", ImportKind::Public));
    let j = fixture.lower(j);

    let transitive: Vec<(String, bool)> = j
        .transitive_imports()
        .into_iter()
        .filter(|(path, _)| path != "google/protobuf/descriptor.proto")
        .collect();
    assert_eq!(
        transitive,
        vec![
            ("i.proto".to_owned(), true),
            ("c.proto".to_owned(), false),
            ("a.proto".to_owned(), true),
        ]
    );
}

#[test]
fn option_set_twice_points_at_first_span() {
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    ast.decls.push(extend(
        "google.protobuf.FieldOptions",
        vec![labeled(AstLabel::Optional, "string", "tag", 50_000)],
    ));

    let mut first = ext_option("tag", str_value("x"));
    match &mut first.path[0] {
        OptionNamePart::Extension(name) => name.span = span_at(10),
        _ => unreachable!(),
    }
    first.span = span_at(10);
    let mut second = ext_option("tag", str_value("y"));
    second.span = span_at(20);

    let mut field_decl = field("string", "s", 1);
    field_decl.options = vec![first, second];
    ast.decls.push(message("M", vec![MessageItem::Field(field_decl)]));
    fixture.lower(ast);

    let conflict = fixture
        .report
        .diagnostics()
        .iter()
        .find_map(|d| match &d.kind {
            DiagnosticKind::OptionSetMultipleTimes { name, first, second } => {
                Some((name.clone(), first.span, second.span))
            }
            _ => None,
        })
        .expect("missing duplicate-option diagnostic");
    assert_eq!(conflict.0, "tag");
    assert_eq!(conflict.1.start.offset, 10);
    assert_eq!(conflict.2.start.offset, 20);
}

#[test]
fn invisible_symbol_suggests_import() {
    // z imports y which (non-publicly) imports x; a reference from z to
    // x's type is found but not visible, and the diagnostic names x.
    let mut fixture = Fixture::new();
    let mut x = source("x.proto", Syntax::Proto3);
    x.decls.push(message("Hidden", vec![]));
    fixture.lower(x);

    let mut y = source("y.proto", Syntax::Proto3);
    y.imports.push(import("x.proto", ImportKind::Default));
    y.decls
        .push(message("Seen", vec![MessageItem::Field(field("Hidden", "h", 1))]));
    fixture.lower(y);

    let mut z = source("z.proto", Syntax::Proto3);
    z.imports.push(import("y.proto", ImportKind::Default));
    z.decls
        .push(message("M", vec![MessageItem::Field(field("Hidden", "h", 1))]));
    fixture.lower(z);

    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::NameNotVisible { name, providing_file, .. }
            if name == "Hidden" && providing_file == "x.proto"
    )));
}

#[test]
fn public_import_reexports_symbols() {
    let mut fixture = Fixture::new();
    let mut x = source("x.proto", Syntax::Proto3);
    x.decls.push(message("Base", vec![]));
    fixture.lower(x);

    let mut y = source("y.proto", Syntax::Proto3);
    y.imports.push(import("x.proto", ImportKind::Public));
    fixture.lower(y);

    let mut z = source("z.proto", Syntax::Proto3);
    z.imports.push(import("y.proto", ImportKind::Default));
    z.decls
        .push(message("M", vec![MessageItem::Field(field("Base", "b", 1))]));
    let z = fixture.lower(z);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let member = member_by_fqn(&z, "M.b");
    assert_eq!(elem_fqn(&z, member), "Base");
}

#[test]
fn unused_import_warns_and_used_import_does_not() {
    let mut fixture = Fixture::new();
    let mut x = source("x.proto", Syntax::Proto3);
    x.decls.push(message("Base", vec![]));
    fixture.lower(x);
    let mut y = source("y.proto", Syntax::Proto3);
    y.decls.push(message("Other", vec![]));
    fixture.lower(y);

    let mut z = source("z.proto", Syntax::Proto3);
    z.imports.push(import("x.proto", ImportKind::Default));
    z.imports.push(import("y.proto", ImportKind::Default));
    z.decls
        .push(message("M", vec![MessageItem::Field(field("Base", "b", 1))]));
    fixture.lower(z);

    let unused: Vec<_> = fixture
        .report
        .diagnostics()
        .iter()
        .filter_map(|d| match &d.kind {
            DiagnosticKind::UnusedImport { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(unused, vec!["y.proto".to_owned()]);
    assert!(!fixture.report.has_errors());
}

#[test]
fn duplicate_names_tie_break_deterministically() {
    let mut fixture = Fixture::new();
    let mut b = source("b.proto", Syntax::Proto3);
    b.decls.push(message("Dup", vec![]));
    fixture.lower(b);

    let mut a = source("a.proto", Syntax::Proto3);
    a.imports.push(import("b.proto", ImportKind::Default));
    a.decls.push(message("Dup", vec![]));
    fixture.lower(a);

    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::DuplicateName { name, .. } if name == "Dup"
    )));
}

#[test]
fn map_entry_name_collisions_collapse_silently() {
    // The external map lowering synthesizes a nested FooEntry message for a
    // map field; a declared message with the same name must not raise a
    // duplicate-name diagnostic.
    let mut fixture = Fixture::new();
    let mut ast = source("maps.proto", Syntax::Proto3);
    let mut key = field("string", "key", 1);
    key.is_map_key = true;
    ast.decls.push(message(
        "M",
        vec![
            nested(
                "FooEntry",
                vec![
                    MessageItem::Field(key),
                    MessageItem::Field(field("int32", "value", 2)),
                ],
            ),
            nested("FooEntry", vec![]),
        ],
    ));
    fixture.lower(ast);

    assert!(!fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::DuplicateName { .. })));
}

#[test]
fn empty_oneof_is_rejected() {
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    ast.decls.push(message(
        "M",
        vec![MessageItem::Oneof(OneofDecl {
            name: Ident::new("choice"),
            items: vec![],
            ..Default::default()
        })],
    ));
    fixture.lower(ast);

    assert!(fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::EmptyOneof { .. })));
}

#[test]
fn oneof_members_join_the_message_fields() {
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    ast.decls.push(message(
        "M",
        vec![MessageItem::Oneof(OneofDecl {
            name: Ident::new("choice"),
            items: vec![
                OneofItem::Field(field("int32", "a", 1)),
                OneofItem::Field(field("string", "b", 2)),
            ],
            ..Default::default()
        })],
    ));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let a = member_by_fqn(&file, "M.a");
    let b = member_by_fqn(&file, "M.b");
    assert_eq!(a.oneof_index(), b.oneof_index());
    assert!(a.oneof_index().is_some());
    let ty = &file.inner.types[0];
    assert_eq!(ty.fields().len(), 2);
}

#[test]
fn proto3_enum_must_start_at_zero() {
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    ast.decls
        .push(crate::ast::Decl::Enum(enum_decl("E", &[("E_ONE", 1)])));
    fixture.lower(ast);

    assert!(fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::InvalidProto3EnumDefault { .. })));
}

#[test]
fn duplicate_field_numbers_are_reported() {
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    ast.decls.push(message(
        "M",
        vec![
            MessageItem::Field(field("int32", "a", 1)),
            MessageItem::Field(field("int32", "b", 1)),
        ],
    ));
    fixture.lower(ast);

    assert!(fixture.report.diagnostics().iter().any(
        |d| matches!(d.kind, DiagnosticKind::DuplicateFieldNumber { number: 1, .. })
    ));
}

#[test]
fn enum_aliases_require_allow_alias() {
    let mut fixture = Fixture::new();
    let mut ast = source("dup.proto", Syntax::Proto2);
    ast.decls
        .push(crate::ast::Decl::Enum(enum_decl("E", &[("A", 1), ("B", 1)])));
    fixture.lower(ast);
    assert!(fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::DuplicateEnumNumber { .. })));

    let mut fixture = Fixture::new();
    let mut aliased = enum_decl("E", &[("A", 1), ("B", 1)]);
    aliased.items.insert(
        0,
        crate::ast::EnumItem::Option(plain_option("allow_alias", ident_value("true"))),
    );
    let mut ast = source("alias.proto", Syntax::Proto2);
    ast.decls.push(crate::ast::Decl::Enum(aliased));
    fixture.lower(ast);
    assert!(!fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::DuplicateEnumNumber { .. })));
}

#[test]
fn enums_are_not_map_keys() {
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    let mut key = field("E", "key", 1);
    key.is_map_key = true;
    ast.decls.push(message(
        "Entry",
        vec![enum_item("E", &[("E_ZERO", 0)]), MessageItem::Field(key)],
    ));
    fixture.lower(ast);

    assert!(fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::InvalidMapKeyType { .. })));
}

#[test]
fn scalar_names_can_be_shadowed() {
    // A message named int32 shadows the predeclared scalar; the scalar is
    // only a fallback.
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    ast.decls.push(message("int32", vec![]));
    ast.decls
        .push(message("M", vec![MessageItem::Field(field("int32", "x", 1))]));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let member = member_by_fqn(&file, "M.x");
    assert_eq!(elem_fqn(&file, member), "int32");
    assert_eq!(member.elem.unwrap().file, FileSlot::LOCAL);
}

#[test]
fn unshadowed_scalar_falls_back_to_predeclared() {
    let mut fixture = Fixture::new();
    let mut ast = source("test.proto", Syntax::Proto3);
    ast.decls
        .push(message("M", vec![MessageItem::Field(field("int32", "x", 1))]));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors());
    let member = member_by_fqn(&file, "M.x");
    assert_eq!(member.elem.unwrap().file, FileSlot::PREDECLARED);
}

#[test]
fn import_option_requires_edition_2024() {
    let mut fixture = Fixture::new();
    fixture.lower(source("a.proto", Syntax::Proto3));

    let mut old = source("old.proto", Syntax::Edition(2023));
    old.imports.push(import("a.proto", ImportKind::Option));
    fixture.lower(old);
    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::EditionTooOld { feature, edition, introduced, .. }
            if feature == "import option" && edition == "2023" && introduced == "2024"
    )));

    let mut fixture = Fixture::new();
    fixture.lower(source("a.proto", Syntax::Proto3));
    let mut new = source("new.proto", Syntax::Edition(2024));
    new.imports.push(import("a.proto", ImportKind::Option));
    fixture.lower(new);
    assert!(!fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::EditionTooOld { .. })));
}

#[test]
fn required_label_is_too_new_for_editions() {
    let mut fixture = Fixture::new();
    let mut ast = source("ed.proto", Syntax::Edition(2023));
    ast.decls.push(message(
        "M",
        vec![MessageItem::Field(labeled(
            AstLabel::Required,
            "int32",
            "x",
            1,
        ))],
    ));
    fixture.lower(ast);

    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::EditionTooNew { feature, removed, .. }
            if feature == "the required label" && removed == "2023"
    )));
}

#[test]
fn cycle_error_becomes_diagnostic() {
    struct CycleImporter;
    impl crate::Importer for CycleImporter {
        fn import(
            &mut self,
            _index: usize,
            _canonical_path: &str,
            _decl: &crate::ast::ImportDecl,
        ) -> Result<File, crate::ImportError> {
            Err(crate::ImportError::Cycle)
        }
    }

    let session = crate::Session::new();
    let mut report = crate::Report::new();
    let mut ast = source("self.proto", Syntax::Proto3);
    ast.imports.push(import("loop.proto", ImportKind::Default));
    session.lower(ast, &mut CycleImporter, &mut report);

    assert!(report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::ImportCycle { path, .. } if path == "loop.proto"
    )));
}

#[test]
fn method_signatures_resolve_to_messages() {
    let mut fixture = Fixture::new();
    let mut ast = source("svc.proto", Syntax::Proto3);
    package(&mut ast, "api");
    ast.decls.push(message("Req", vec![]));
    ast.decls.push(message("Res", vec![]));
    ast.decls.push(service("Svc", vec![method("Call", "Req", "Res")]));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let raw = &file.inner.methods[0];
    assert!(raw.input.is_some());
    assert!(raw.output.is_some());
}

#[test]
fn deprecated_cross_file_reference_warns() {
    let mut fixture = Fixture::new();
    let mut old = source("old.proto", Syntax::Proto3);
    let mut dep = message_decl("Old", vec![]);
    dep.items
        .push(MessageItem::Option(plain_option("deprecated", ident_value("true"))));
    old.decls.push(crate::ast::Decl::Message(dep));
    fixture.lower(old);

    let mut user = source("user.proto", Syntax::Proto3);
    user.imports.push(import("old.proto", ImportKind::Default));
    user.decls
        .push(message("M", vec![MessageItem::Field(field("Old", "o", 1))]));
    fixture.lower(user);

    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::DeprecatedReference { name, .. } if name == "Old"
    )));
    assert!(!fixture.report.has_errors());
}

#[test]
fn option_target_constraints_are_enforced() {
    let mut fixture = Fixture::new();
    let mut ast = source("targets.proto", Syntax::Proto3);
    let mut ext_field = labeled(AstLabel::Optional, "string", "file_only", 50_001);
    ext_field.options = vec![plain_option(
        "targets",
        crate::ast::OptionValue::List(crate::ast::ListLit {
            elems: vec![ident_value("TARGET_TYPE_FILE")],
            ..Default::default()
        }),
    )];
    ast.decls
        .push(extend("google.protobuf.FieldOptions", vec![ext_field]));

    let mut victim = field("string", "s", 1);
    victim.options = vec![ext_option("file_only", str_value("x"))];
    ast.decls.push(message("M", vec![MessageItem::Field(victim)]));
    fixture.lower(ast);

    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::OptionTargetMismatch { option, .. } if option == "file_only"
    )));
}

#[test]
fn forbidden_option_names_are_rejected() {
    let mut fixture = Fixture::new();
    let mut ast = source("forbidden.proto", Syntax::Proto3);
    let mut m = message_decl("M", vec![]);
    m.items
        .push(MessageItem::Option(plain_option("map_entry", ident_value("true"))));
    ast.decls.push(crate::ast::Decl::Message(m));
    ast.options
        .push(plain_option("features", ident_value("true")));
    fixture.lower(ast);

    assert!(fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::OptionMapEntryForbidden { .. })));
    assert!(fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::OptionFeaturesForbidden { .. })));
}

#[test]
fn pseudo_options_stay_out_of_the_value_tree() {
    let mut fixture = Fixture::new();
    let mut ast = source("pseudo.proto", Syntax::Proto2);
    let mut f = labeled(AstLabel::Optional, "string", "s", 1);
    f.options = vec![
        plain_option("json_name", str_value("sCustom")),
        plain_option("default", str_value("hi")),
    ];
    ast.decls.push(message("M", vec![MessageItem::Field(f)]));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let member = member_by_fqn(&file, "M.s");
    assert!(member.options.is_none());
    assert!(member.pseudo.default_value.is_some());
    let (json_name, _) = member.pseudo.json_name.unwrap();
    assert_eq!(&*file.session.interner().get(json_name), "sCustom");
}

#[test]
fn pseudo_option_with_suffix_is_rejected() {
    let mut fixture = Fixture::new();
    let mut ast = source("pseudo.proto", Syntax::Proto2);
    let mut f = labeled(AstLabel::Optional, "string", "s", 1);
    f.options = vec![crate::ast::OptionDecl {
        path: vec![
            OptionNamePart::Ident(Ident::new("default")),
            OptionNamePart::Ident(Ident::new("x")),
        ],
        value: str_value("hi"),
        ..Default::default()
    }];
    ast.decls.push(message("M", vec![MessageItem::Field(f)]));
    fixture.lower(ast);

    assert!(fixture.report.diagnostics().iter().any(|d| matches!(
        &d.kind,
        DiagnosticKind::OptionPseudoWithSuffix { name, .. } if name == "default"
    )));
}

#[test]
fn group_declares_type_and_member() {
    let mut fixture = Fixture::new();
    let mut ast = source("groups.proto", Syntax::Proto2);
    ast.decls.push(message(
        "M",
        vec![MessageItem::Group(crate::ast::GroupDecl {
            label: Some(crate::ast::LabelDecl {
                label: AstLabel::Optional,
                span: Default::default(),
            }),
            name: Ident::new("Result"),
            number: crate::ast::IntLit::new(1),
            items: vec![MessageItem::Field(field("int32", "code", 1))],
            ..Default::default()
        })],
    ));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let member = member_by_fqn(&file, "M.result");
    assert!(member.is_group);
    assert_eq!(elem_fqn(&file, member), "M.Result");
}

#[test]
fn field_type_from_option_typename() {
    // An absolute path bypasses scope climbing entirely.
    let mut fixture = Fixture::new();
    let mut ast = source("abs.proto", Syntax::Proto3);
    package(&mut ast, "foo.bar");
    ast.decls.push(message("Target", vec![]));
    ast.decls.push(message(
        "M",
        vec![MessageItem::Field(field(".foo.bar.Target", "t", 1))],
    ));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let member = member_by_fqn(&file, "foo.bar.M.t");
    assert_eq!(elem_fqn(&file, member), "foo.bar.Target");
}

#[test]
fn extension_fields_record_their_extendee() {
    let mut fixture = Fixture::new();
    let mut ast = source("ext.proto", Syntax::Proto2);
    ast.decls.push(message(
        "Extendable",
        vec![MessageItem::Extensions(crate::ast::ExtensionsDecl {
            ranges: vec![crate::ast::TagRangeDecl {
                start: 100,
                end: Some(200),
                ..Default::default()
            }],
            ..Default::default()
        })],
    ));
    ast.decls.push(extend(
        "Extendable",
        vec![labeled(AstLabel::Optional, "string", "extra", 100)],
    ));
    let file = fixture.lower(ast);

    assert!(!fixture.report.has_errors(), "{:?}", fixture.report);
    let member = member_by_fqn(&file, "extra");
    assert!(member.is_extension);
    let container = member.container.expect("extendee unresolved");
    let target = resolve_slot(&file.session, &file.inner, container.file);
    assert_eq!(
        &*file.session.interner().get(target.get().type_(container.index).fqn),
        "Extendable"
    );
}

#[test]
fn oneof_arms_conflict_in_option_paths() {
    // Setting two different members of the same oneof inside an options
    // message collides on the oneof key. The builtin options have no
    // oneofs, so model it with a custom options message.
    let mut fixture = Fixture::new();
    let mut ast = source("oneof_opt.proto", Syntax::Proto2);
    ast.decls.push(message(
        "Opts",
        vec![MessageItem::Oneof(OneofDecl {
            name: Ident::new("kind"),
            items: vec![
                OneofItem::Field(field("int32", "a", 1)),
                OneofItem::Field(field("int32", "b", 2)),
            ],
            ..Default::default()
        })],
    ));
    ast.decls.push(extend(
        "google.protobuf.MessageOptions",
        vec![labeled(AstLabel::Optional, "Opts", "opts", 50_002)],
    ));

    let mut target = message_decl("M", vec![]);
    target.items.push(MessageItem::Option(crate::ast::OptionDecl {
        path: vec![
            OptionNamePart::Extension(TypeName::new("opts")),
            OptionNamePart::Ident(Ident::new("a")),
        ],
        value: int_value(1),
        span: span_at(1),
        ..Default::default()
    }));
    target.items.push(MessageItem::Option(crate::ast::OptionDecl {
        path: vec![
            OptionNamePart::Extension(TypeName::new("opts")),
            OptionNamePart::Ident(Ident::new("b")),
        ],
        value: int_value(2),
        span: span_at(2),
        ..Default::default()
    }));
    ast.decls.push(crate::ast::Decl::Message(target));
    fixture.lower(ast);

    assert!(fixture
        .report
        .diagnostics()
        .iter()
        .any(|d| matches!(&d.kind, DiagnosticKind::OptionSetMultipleTimes { .. })));
}
