//! Second-pass validation over the fully linked graph.
//!
//! Structural invariants that need the whole type in hand (duplicate
//! numbers, empty enums and oneofs, name-shape collisions), deprecation
//! warnings, option target constraints and the unused-import warning all
//! run here, after resolution and option interpretation.

use std::collections::HashMap;

use crate::{
    ast::{ImportKind, Syntax},
    error::{DiagnosticKind, Label, Report},
    ir::{
        build::to_json_name, resolve_slot, FileInner, FileSlot, MessageValueIndex,
        OptionTarget, RawType, Session, TypeRef,
    },
};

pub(crate) fn run(session: &Session, file: &FileInner, report: &mut Report) {
    structural(session, file, report);
    deprecation(session, file, report);
    target_constraints(session, file, report);
    unused_imports(file, report);
}

fn structural(session: &Session, file: &FileInner, report: &mut Report) {
    for ty in &file.types {
        if ty.is_enum() {
            check_enum(file, ty, report);
        } else {
            check_message(session, file, ty, report);
        }
    }

    for oneof in &file.oneofs {
        if oneof.members.is_empty() {
            report.push(DiagnosticKind::EmptyOneof {
                found: Label::new("oneof defined here", &file.path, oneof.ast.span),
            });
        }
    }
}

fn check_message(session: &Session, file: &FileInner, ty: &RawType, report: &mut Report) {
    let mut numbers: HashMap<i32, crate::ir::MemberIndex> = HashMap::new();
    let mut json_names: HashMap<String, crate::ir::MemberIndex> = HashMap::new();
    let mut camel_names: HashMap<String, crate::ir::MemberIndex> = HashMap::new();

    for &index in ty.fields() {
        let member = file.member(index);
        let name = session.interner().get(member.name);

        if let Some(&existing) = numbers.get(&member.number) {
            report.push(DiagnosticKind::DuplicateFieldNumber {
                number: member.number,
                first: Label::new(
                    "first used here",
                    &file.path,
                    file.member(existing).ast.span,
                ),
                second: Label::new("used again here", &file.path, member.ast.span),
            });
        } else {
            numbers.insert(member.number, index);
        }

        let json_name = match member.pseudo.json_name {
            Some((id, _)) => session.interner().get(id).to_string(),
            None => to_json_name(&name),
        };
        if let Some(&existing) = json_names.get(&json_name) {
            report.push(DiagnosticKind::DuplicateFieldJsonName {
                name: json_name.clone(),
                first: Label::new(
                    "first defined here",
                    &file.path,
                    file.member(existing).ast.span,
                ),
                second: Label::new("defined again here", &file.path, member.ast.span),
            });
        } else {
            json_names.insert(json_name, index);
        }

        if file.syntax != Syntax::Proto2 {
            let camel = to_lower_without_underscores(&name);
            if let Some(&existing) = camel_names.get(&camel) {
                report.push(DiagnosticKind::DuplicateFieldCamelCaseName {
                    first_name: session.interner().get(file.member(existing).name).to_string(),
                    first: Label::new(
                        "first defined here",
                        &file.path,
                        file.member(existing).ast.span,
                    ),
                    second_name: name.to_string(),
                    second: Label::new("defined again here", &file.path, member.ast.span),
                });
            } else {
                camel_names.insert(camel, index);
            }
        }
    }
}

fn check_enum(file: &FileInner, ty: &RawType, report: &mut Report) {
    let values = ty.fields();
    if values.is_empty() {
        report.push(DiagnosticKind::EmptyEnum {
            found: Label::new("enum defined here", &file.path, ty.ast.span),
        });
        return;
    }

    if file.syntax != Syntax::Proto2 && file.member(values[0]).number != 0 {
        report.push(DiagnosticKind::InvalidProto3EnumDefault {
            found: Label::new(
                "first value defined here",
                &file.path,
                file.member(values[0]).ast.span,
            ),
        });
    }

    if !ty.allow_alias {
        let mut numbers: HashMap<i32, crate::ir::MemberIndex> = HashMap::new();
        for &index in values {
            let member = file.member(index);
            if let Some(&existing) = numbers.get(&member.number) {
                report.push(DiagnosticKind::DuplicateEnumNumber {
                    number: member.number,
                    first: Label::new(
                        "first used here",
                        &file.path,
                        file.member(existing).ast.span,
                    ),
                    second: Label::new("used again here", &file.path, member.ast.span),
                });
            } else {
                numbers.insert(member.number, index);
            }
        }
    }
}

/// Warns on references to deprecated definitions in other files.
/// References within the defining file itself stay quiet.
fn deprecation(session: &Session, file: &FileInner, report: &mut Report) {
    let mut warn_type = |elem: TypeRef, span| {
        if elem.file == FileSlot::LOCAL || elem.file == FileSlot::PREDECLARED {
            return;
        }
        let target = resolve_slot(session, file, elem.file);
        let raw = target.get().type_(elem.index);
        if raw.deprecated {
            report.push(DiagnosticKind::DeprecatedReference {
                name: session.interner().get(raw.fqn).to_string(),
                found: Label::new("referenced here", &file.path, span),
                defined: Label::new(
                    "deprecated type defined here",
                    &target.get().path,
                    raw.ast.span,
                ),
            });
        }
    };

    for member in &file.members {
        if let Some(elem) = member.elem {
            warn_type(elem, member.ast.span);
        }
    }
    for extend in &file.extends {
        if let Some(extendee) = extend.extendee {
            warn_type(extendee, extend.ast.span);
        }
    }
    for method in &file.methods {
        for elem in [method.input, method.output].into_iter().flatten() {
            warn_type(elem, method.ast.span);
        }
    }
    for value in &file.values {
        let member = value.member();
        if member.file == FileSlot::LOCAL || member.file == FileSlot::PREDECLARED {
            continue;
        }
        let target = resolve_slot(session, file, member.file);
        let raw = target.get().member(member.index);
        if raw.deprecated {
            report.push(DiagnosticKind::DeprecatedReference {
                name: session.interner().get(raw.fqn).to_string(),
                found: Label::new("set here", &file.path, value.source_of_elem(0)),
                defined: Label::new(
                    "deprecated field defined here",
                    &target.get().path,
                    raw.ast.span,
                ),
            });
        }
    }
}

/// Checks `FieldOptions.targets` constraints of every option field against
/// the site the option appears on.
fn target_constraints(session: &Session, file: &FileInner, report: &mut Report) {
    let mut check = |mv: Option<MessageValueIndex>, site: OptionTarget| {
        if let Some(mv) = mv {
            check_targets(session, file, mv, site, report);
        }
    };

    check(file.options, OptionTarget::File);
    for ty in &file.types {
        let site = if ty.is_enum() {
            OptionTarget::Enum
        } else {
            OptionTarget::Message
        };
        check(ty.options, site);
    }
    for member in &file.members {
        let site = if member
            .parent
            .map_or(false, |parent| file.type_(parent).is_enum())
        {
            OptionTarget::EnumEntry
        } else {
            OptionTarget::Field
        };
        check(member.options, site);
    }
    for oneof in &file.oneofs {
        check(oneof.options, OptionTarget::Oneof);
    }
    for range in &file.ranges {
        check(range.options, OptionTarget::ExtensionRange);
    }
    for service in &file.services {
        check(service.options, OptionTarget::Service);
    }
    for method in &file.methods {
        check(method.options, OptionTarget::Method);
    }
}

fn check_targets(
    session: &Session,
    file: &FileInner,
    mv: MessageValueIndex,
    site: OptionTarget,
    report: &mut Report,
) {
    let message = file.message_value(mv);
    for &value_index in &message.values {
        let value = file.value(value_index);
        let member = value.member();
        let member_file = resolve_slot(session, file, member.file);
        let raw = member_file.get().member(member.index);

        if !raw.targets.is_empty() && !raw.targets.contains(&site) {
            report.push(DiagnosticKind::OptionTargetMismatch {
                option: session.interner().get(raw.fqn).to_string(),
                target: site.describe(),
                found: Label::new("used here", &file.path, value.first_set_at()),
            });
        }

        // Recurse into message-valued fields.
        let is_message = raw.elem.map_or(false, |elem| {
            let elem_file = resolve_slot(session, member_file.get(), elem.file);
            elem_file.get().type_(elem.index).is_message()
        });
        if is_message {
            for bits in file.value_elems(value) {
                check_targets(session, file, MessageValueIndex(bits as u32), site, report);
            }
        }
    }
}

fn unused_imports(file: &FileInner, report: &mut Report) {
    for entry in file.imports.direct() {
        if entry.kind == Some(ImportKind::Default) && !entry.used {
            if let Some(decl) = entry.decl {
                report.push(DiagnosticKind::UnusedImport {
                    path: entry.original.clone(),
                    found: Label::new("imported here", &file.path, decl.span),
                });
            }
        }
    }
}

fn to_lower_without_underscores(name: &str) -> String {
    name.chars()
        .filter_map(|ch| match ch {
            '_' => None,
            _ => Some(ch.to_ascii_lowercase()),
        })
        .collect()
}
