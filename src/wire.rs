//! Wire-format serialization of evaluated option values.
//!
//! Message length prefixes are reserved as five bytes up front and
//! backpatched once the body length is known; the unused tail bytes are
//! recorded and compacted out in a single final pass, so deeply nested
//! messages never trigger quadratic buffer copying and every emitted prefix
//! is the minimal varint (P7).

use std::ops::Range;

use crate::ir::{
    resolve_slot, FileInner, MessageValueIndex, Scalar, Session, TypeKind, TypeRef,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub(crate) enum WireType {
    Varint = 0,
    SixtyFourBit = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    ThirtyTwoBit = 5,
}

const LEN_RESERVE: usize = 5;

/// An output buffer with backpatched length prefixes.
#[derive(Debug, Default)]
pub(crate) struct Encoder {
    buf: Vec<u8>,
    dead: Vec<Range<usize>>,
    dead_total: usize,
}

/// Marks a reserved length prefix and the dead-byte count at reservation
/// time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LenMark {
    at: usize,
    dead: usize,
}

impl Encoder {
    pub(crate) fn new() -> Encoder {
        Encoder::default()
    }

    pub(crate) fn varint(&mut self, mut value: u64) {
        loop {
            if value < 0x80 {
                self.buf.push(value as u8);
                return;
            }
            self.buf.push(((value & 0x7f) | 0x80) as u8);
            value >>= 7;
        }
    }

    pub(crate) fn tag(&mut self, field: u32, wire_type: WireType) {
        self.varint(((field as u64) << 3) | wire_type as u64);
    }

    pub(crate) fn fixed32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn fixed64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn bytes(&mut self, value: &[u8]) {
        self.varint(value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    /// Reserves a five-byte length prefix; pass the returned mark to
    /// [`Encoder::end_len`] once the body is written.
    pub(crate) fn begin_len(&mut self) -> LenMark {
        let mark = LenMark {
            at: self.buf.len(),
            dead: self.dead_total,
        };
        self.buf.extend_from_slice(&[0; LEN_RESERVE]);
        mark
    }

    /// Backpatches the minimal varint for the body length and records the
    /// unused prefix tail for the final compaction. Dead bytes recorded
    /// inside the body do not count towards its length.
    pub(crate) fn end_len(&mut self, mark: LenMark) {
        let dead_within = self.dead_total - mark.dead;
        let len = (self.buf.len() - mark.at - LEN_RESERVE - dead_within) as u64;
        let mut value = len;
        let mut at = mark.at;
        loop {
            if value < 0x80 {
                self.buf[at] = value as u8;
                at += 1;
                break;
            }
            self.buf[at] = ((value & 0x7f) | 0x80) as u8;
            at += 1;
            value >>= 7;
        }
        if at < mark.at + LEN_RESERVE {
            self.dead_total += mark.at + LEN_RESERVE - at;
            self.dead.push(at..mark.at + LEN_RESERVE);
        }
    }

    /// Compacts the buffer by deleting all recorded dead ranges in one pass.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.dead.is_empty() {
            return self.buf;
        }
        self.dead.sort_by_key(|range| range.start);

        let mut write = self.dead[0].start;
        for i in 0..self.dead.len() {
            let read = self.dead[i].end;
            let until = self
                .dead
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(self.buf.len());
            self.buf.copy_within(read..until, write);
            write += until - read;
        }
        self.buf.truncate(write);
        self.buf
    }
}

/// How a value's elements hit the wire, derived from the member's element
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElemKind {
    Varint,
    Zigzag32,
    Zigzag64,
    Fixed32,
    Fixed64,
    Float,
    Double,
    String,
    Bytes,
    Message,
    Group,
}

impl ElemKind {
    fn wire_type(self) -> WireType {
        match self {
            ElemKind::Varint | ElemKind::Zigzag32 | ElemKind::Zigzag64 => WireType::Varint,
            ElemKind::Fixed32 | ElemKind::Float => WireType::ThirtyTwoBit,
            ElemKind::Fixed64 | ElemKind::Double => WireType::SixtyFourBit,
            ElemKind::String | ElemKind::Bytes | ElemKind::Message => WireType::LengthDelimited,
            ElemKind::Group => WireType::StartGroup,
        }
    }

    fn is_packable(self) -> bool {
        !matches!(
            self,
            ElemKind::String | ElemKind::Bytes | ElemKind::Message | ElemKind::Group
        )
    }
}

fn elem_kind(session: &Session, file: &FileInner, elem: TypeRef, is_group: bool) -> ElemKind {
    let target = resolve_slot(session, file, elem.file);
    match target.get().type_(elem.index).kind {
        TypeKind::Scalar(scalar) => match scalar {
            Scalar::Int32 | Scalar::Int64 | Scalar::Uint32 | Scalar::Uint64 | Scalar::Bool => {
                ElemKind::Varint
            }
            Scalar::Sint32 => ElemKind::Zigzag32,
            Scalar::Sint64 => ElemKind::Zigzag64,
            Scalar::Fixed32 | Scalar::Sfixed32 => ElemKind::Fixed32,
            Scalar::Fixed64 | Scalar::Sfixed64 => ElemKind::Fixed64,
            Scalar::Float => ElemKind::Float,
            Scalar::Double => ElemKind::Double,
            Scalar::String => ElemKind::String,
            Scalar::Bytes => ElemKind::Bytes,
        },
        TypeKind::Enum => ElemKind::Varint,
        TypeKind::Message if is_group => ElemKind::Group,
        TypeKind::Message => ElemKind::Message,
    }
}

/// Serializes an evaluated message value to wire format.
pub(crate) fn encode_message_value(
    session: &Session,
    file: &FileInner,
    index: MessageValueIndex,
) -> Vec<u8> {
    let mut enc = Encoder::new();
    write_message_value(&mut enc, session, file, index);
    enc.finish()
}

fn write_message_value(
    enc: &mut Encoder,
    session: &Session,
    file: &FileInner,
    index: MessageValueIndex,
) {
    let mv = file.message_value(index);

    if let Some(any) = mv.any {
        // google.protobuf.Any wraps the concrete message: type_url = 1,
        // value = 2.
        let url = session.interner().get(any.type_url);
        enc.tag(1, WireType::LengthDelimited);
        enc.bytes(url.as_bytes());
        enc.tag(2, WireType::LengthDelimited);
        let mark = enc.begin_len();
        write_message_value(enc, session, file, any.concrete);
        enc.end_len(mark);
        return;
    }

    for &value in &mv.values {
        write_value(enc, session, file, file.value(value));
    }
}

fn write_value(enc: &mut Encoder, session: &Session, file: &FileInner, value: &Value) {
    let member_ref = value.member();
    let member_file = resolve_slot(session, file, member_ref.file);
    let member = member_file.get().member(member_ref.index);
    let number = member.number as u32;
    let kind = match member.elem {
        Some(elem) => elem_kind(session, member_file.get(), elem, member.is_group),
        // Unresolved element type; the diagnostic was already reported.
        None => return,
    };

    let elems = file.value_elems(value);

    if member.is_repeated() && elems.len() >= 2 && kind.is_packable() {
        enc.tag(number, WireType::LengthDelimited);
        let mark = enc.begin_len();
        for &bits in &elems {
            write_scalar(enc, kind, bits);
        }
        enc.end_len(mark);
        return;
    }

    for &bits in &elems {
        match kind {
            ElemKind::String => {
                enc.tag(number, WireType::LengthDelimited);
                let s = session
                    .interner()
                    .get(crate::ir::intern::InternId::from_raw(bits as u32));
                enc.bytes(s.as_bytes());
            }
            ElemKind::Bytes => {
                enc.tag(number, WireType::LengthDelimited);
                let b = session
                    .interner()
                    .get_bytes(crate::ir::intern::BytesId::from_raw(bits as u32));
                enc.bytes(&b);
            }
            ElemKind::Message => {
                enc.tag(number, WireType::LengthDelimited);
                let mark = enc.begin_len();
                write_message_value(enc, session, file, MessageValueIndex(bits as u32));
                enc.end_len(mark);
            }
            ElemKind::Group => {
                enc.tag(number, WireType::StartGroup);
                write_message_value(enc, session, file, MessageValueIndex(bits as u32));
                enc.tag(number, WireType::EndGroup);
            }
            _ => {
                enc.tag(number, kind.wire_type());
                write_scalar(enc, kind, bits);
            }
        }
    }
}

fn write_scalar(enc: &mut Encoder, kind: ElemKind, bits: u64) {
    match kind {
        ElemKind::Varint => enc.varint(bits),
        ElemKind::Zigzag32 => {
            let v = bits as i32;
            enc.varint(((v << 1) ^ (v >> 31)) as u32 as u64);
        }
        ElemKind::Zigzag64 => {
            let v = bits as i64;
            enc.varint(((v << 1) ^ (v >> 63)) as u64);
        }
        ElemKind::Fixed32 => enc.fixed32(bits as u32),
        ElemKind::Fixed64 => enc.fixed64(bits),
        // Floats are stored widened to f64 and narrowed on emission.
        ElemKind::Float => enc.fixed32((f64::from_bits(bits) as f32).to_bits()),
        ElemKind::Double => enc.fixed64(bits),
        ElemKind::String | ElemKind::Bytes | ElemKind::Message | ElemKind::Group => {
            unreachable!("length-delimited kinds are handled by the caller")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varints_match_reference_encoding() {
        let mut enc = Encoder::new();
        enc.varint(0);
        enc.varint(1);
        enc.varint(127);
        enc.varint(128);
        enc.varint(300);
        enc.varint(u64::MAX);
        assert_eq!(
            enc.finish(),
            [
                0x00, 0x01, 0x7f, 0x80, 0x01, 0xac, 0x02, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
                0xff, 0xff, 0xff, 0x01
            ]
        );
    }

    #[test]
    fn length_prefixes_compact_to_minimal_varints() {
        let mut enc = Encoder::new();
        enc.tag(1, WireType::LengthDelimited);
        let outer = enc.begin_len();
        enc.tag(2, WireType::LengthDelimited);
        let inner = enc.begin_len();
        enc.varint(0x08);
        enc.varint(0x2a);
        enc.end_len(inner);
        enc.end_len(outer);
        // field 1 { field 2 { 08 2a } } with one-byte prefixes after
        // compaction.
        assert_eq!(enc.finish(), [0x0a, 0x04, 0x12, 0x02, 0x08, 0x2a]);
    }

    #[test]
    fn nested_prefixes_compact_in_declaration_order() {
        let mut enc = Encoder::new();
        let a = enc.begin_len();
        enc.varint(1);
        enc.end_len(a);
        let b = enc.begin_len();
        let payload = vec![0xffu8; 200];
        for &byte in &payload {
            enc.varint(byte as u64 & 0x7f);
        }
        enc.end_len(b);
        let out = enc.finish();
        assert_eq!(out[0], 1); // minimal prefix for the one-byte body
        assert_eq!(out[1], 1);
        // 200-byte body takes a two-byte varint prefix.
        assert_eq!(&out[2..4], &[0xc8, 0x01]);
        assert_eq!(out.len(), 2 + 2 + 200);
    }

    #[test]
    fn zigzag_encoding() {
        let mut enc = Encoder::new();
        write_scalar(&mut enc, ElemKind::Zigzag32, -1i64 as u64);
        write_scalar(&mut enc, ElemKind::Zigzag32, 1u64);
        write_scalar(&mut enc, ElemKind::Zigzag64, -2i64 as u64);
        assert_eq!(enc.finish(), [0x01, 0x02, 0x03]);
    }
}
