//! Wire-level descriptor structs.
//!
//! These mirror `descriptor.proto` but carry options as the raw bytes the
//! option evaluator produced, spliced verbatim into the output stream.
//! Sub-messages without an options field come from `prost-types` directly.

use std::fmt;

use prost::{
    bytes::{Buf, BufMut},
    encoding::{DecodeContext, WireType},
    DecodeError, Message,
};

pub(crate) use prost_types::{
    descriptor_proto::ReservedRange, enum_descriptor_proto::EnumReservedRange, SourceCodeInfo,
};

#[derive(Clone, PartialEq, Message)]
pub(crate) struct FileDescriptorSet {
    #[prost(message, repeated, tag = "1")]
    pub file: Vec<FileDescriptorProto>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct FileDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub package: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub dependency: Vec<String>,
    #[prost(int32, repeated, packed = "false", tag = "10")]
    pub public_dependency: Vec<i32>,
    #[prost(int32, repeated, packed = "false", tag = "11")]
    pub weak_dependency: Vec<i32>,
    #[prost(message, repeated, tag = "4")]
    pub message_type: Vec<DescriptorProto>,
    #[prost(message, repeated, tag = "5")]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[prost(message, repeated, tag = "6")]
    pub service: Vec<ServiceDescriptorProto>,
    #[prost(message, repeated, tag = "7")]
    pub extension: Vec<FieldDescriptorProto>,
    #[prost(message, optional, tag = "8")]
    pub options: Option<EncodedOptions>,
    #[prost(message, optional, tag = "9")]
    pub source_code_info: Option<SourceCodeInfo>,
    #[prost(string, optional, tag = "12")]
    pub syntax: Option<String>,
    #[prost(int32, optional, tag = "14")]
    pub edition: Option<i32>,
    #[prost(message, optional, tag = "55555")]
    pub file_info: Option<FileInfo>,
}

/// The private extension emitted alongside `SourceCodeInfo`.
#[derive(Clone, PartialEq, Message)]
pub(crate) struct FileInfo {
    #[prost(bool, optional, tag = "1")]
    pub is_syntax_unspecified: Option<bool>,
    #[prost(int32, repeated, packed = "false", tag = "2")]
    pub unused_dependency: Vec<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct DescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub field: Vec<FieldDescriptorProto>,
    #[prost(message, repeated, tag = "6")]
    pub extension: Vec<FieldDescriptorProto>,
    #[prost(message, repeated, tag = "3")]
    pub nested_type: Vec<DescriptorProto>,
    #[prost(message, repeated, tag = "4")]
    pub enum_type: Vec<EnumDescriptorProto>,
    #[prost(message, repeated, tag = "5")]
    pub extension_range: Vec<ExtensionRange>,
    #[prost(message, repeated, tag = "8")]
    pub oneof_decl: Vec<OneofDescriptorProto>,
    #[prost(message, optional, tag = "7")]
    pub options: Option<EncodedOptions>,
    #[prost(message, repeated, tag = "9")]
    pub reserved_range: Vec<ReservedRange>,
    #[prost(string, repeated, tag = "10")]
    pub reserved_name: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct ExtensionRange {
    #[prost(int32, optional, tag = "1")]
    pub start: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub end: Option<i32>,
    #[prost(message, optional, tag = "3")]
    pub options: Option<EncodedOptions>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct FieldDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int32, optional, tag = "3")]
    pub number: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub label: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "6")]
    pub type_name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub extendee: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub default_value: Option<String>,
    #[prost(int32, optional, tag = "9")]
    pub oneof_index: Option<i32>,
    #[prost(string, optional, tag = "10")]
    pub json_name: Option<String>,
    #[prost(message, optional, tag = "8")]
    pub options: Option<EncodedOptions>,
    #[prost(bool, optional, tag = "17")]
    pub proto3_optional: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct OneofDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, optional, tag = "2")]
    pub options: Option<EncodedOptions>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct EnumDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub value: Vec<EnumValueDescriptorProto>,
    #[prost(message, optional, tag = "3")]
    pub options: Option<EncodedOptions>,
    #[prost(message, repeated, tag = "4")]
    pub reserved_range: Vec<EnumReservedRange>,
    #[prost(string, repeated, tag = "5")]
    pub reserved_name: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct EnumValueDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int32, optional, tag = "2")]
    pub number: Option<i32>,
    #[prost(message, optional, tag = "3")]
    pub options: Option<EncodedOptions>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct ServiceDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub method: Vec<MethodDescriptorProto>,
    #[prost(message, optional, tag = "3")]
    pub options: Option<EncodedOptions>,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct MethodDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub input_type: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub output_type: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub options: Option<EncodedOptions>,
    #[prost(bool, optional, tag = "5")]
    pub client_streaming: Option<bool>,
    #[prost(bool, optional, tag = "6")]
    pub server_streaming: Option<bool>,
}

/// Pre-encoded option bytes emitted verbatim.
#[derive(Clone, Default, PartialEq)]
pub(crate) struct EncodedOptions {
    pub(crate) encoded: Vec<u8>,
}

impl fmt::Debug for EncodedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedOptions({} bytes)", self.encoded.len())
    }
}

impl Message for EncodedOptions {
    fn encode_raw(&self, buf: &mut impl BufMut)
    where
        Self: Sized,
    {
        buf.put(self.encoded.as_slice());
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        _ctx: DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        // Re-encode the key, then copy the field body byte for byte, so
        // decoding and re-encoding preserves unknown options exactly.
        push_varint(&mut self.encoded, ((tag as u64) << 3) | wire_type as u64);
        copy_value(&mut self.encoded, buf, wire_type)
    }

    fn encoded_len(&self) -> usize {
        self.encoded.len()
    }

    fn clear(&mut self) {
        self.encoded.clear();
    }
}

fn push_varint(dest: &mut Vec<u8>, mut value: u64) {
    loop {
        if value < 0x80 {
            dest.push(value as u8);
            return;
        }
        dest.push(((value & 0x7f) | 0x80) as u8);
        value >>= 7;
    }
}

/// Copies one field body of the given wire type from `buf` into `dest`.
fn copy_value<B: Buf>(
    dest: &mut Vec<u8>,
    buf: &mut B,
    wire_type: WireType,
) -> Result<(), DecodeError> {
    match wire_type {
        WireType::Varint => {
            copy_varint(dest, buf)?;
        }
        WireType::SixtyFourBit => copy_bytes(dest, buf, 8)?,
        WireType::ThirtyTwoBit => copy_bytes(dest, buf, 4)?,
        WireType::LengthDelimited => {
            let len = copy_varint(dest, buf)?;
            copy_bytes(dest, buf, len as usize)?;
        }
        WireType::StartGroup => copy_group(dest, buf)?,
        WireType::EndGroup => return Err(DecodeError::new("unexpected end group tag")),
    }
    Ok(())
}

fn copy_varint<B: Buf>(dest: &mut Vec<u8>, buf: &mut B) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for shift in 0..10 {
        if !buf.has_remaining() {
            return Err(DecodeError::new("buffer underflow"));
        }
        let byte = buf.get_u8();
        dest.push(byte);
        value |= ((byte & 0x7f) as u64) << (shift * 7);
        if byte < 0x80 {
            return Ok(value);
        }
    }
    Err(DecodeError::new("invalid varint"))
}

fn copy_bytes<B: Buf>(dest: &mut Vec<u8>, buf: &mut B, len: usize) -> Result<(), DecodeError> {
    if buf.remaining() < len {
        return Err(DecodeError::new("buffer underflow"));
    }
    let start = dest.len();
    dest.resize(start + len, 0);
    buf.copy_to_slice(&mut dest[start..]);
    Ok(())
}

/// Copies a group body up to and including its end tag.
fn copy_group<B: Buf>(dest: &mut Vec<u8>, buf: &mut B) -> Result<(), DecodeError> {
    loop {
        let key = copy_varint(dest, buf)?;
        let wire_type = match key & 0x7 {
            0 => WireType::Varint,
            1 => WireType::SixtyFourBit,
            2 => WireType::LengthDelimited,
            3 => WireType::StartGroup,
            4 => WireType::EndGroup,
            5 => WireType::ThirtyTwoBit,
            _ => return Err(DecodeError::new("invalid wire type")),
        };
        if wire_type == WireType::EndGroup {
            return Ok(());
        }
        copy_value(dest, buf, wire_type)?;
    }
}
