//! Evaluated option values.
//!
//! A [`Value`] is one leaf assignment: the member it sets plus a single
//! `bits` word whose meaning follows the member's element type. Repeated
//! fields with two or more elements spill into a slice arena; the
//! discriminator steals the sign bit of the member arena index and stays
//! behind the accessor pair so no other code depends on the packing.

use std::collections::HashMap;

use crate::{
    ast::Span,
    ir::{intern::InternId, FileSlot, MemberIndex, MemberRef, MessageValueIndex},
};

/// Index into the per-file slice arena for repeated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SliceIndex(pub(crate) u32);

const SLICE_FLAG: u32 = 1 << 31;

#[derive(Debug)]
pub(crate) struct Value {
    member_file: FileSlot,
    /// Member arena index; the high bit flags "bits is a slice index".
    member_word: u32,
    /// Scalar bit pattern, intern id, message-value index or slice index,
    /// depending on the member's element type and the slice flag.
    bits: u64,
    /// Every AST expression that contributed to this value, in order.
    pub(crate) exprs: Vec<Span>,
    /// Prefix sums: `elem_counts[i]` is the number of elements contributed
    /// by expressions `0..=i`.
    pub(crate) elem_counts: Vec<u32>,
    /// The option path each contribution was spelled with.
    pub(crate) option_paths: Vec<Span>,
    /// The message value this value was inserted into.
    pub(crate) container: Option<MessageValueIndex>,
}

impl Value {
    pub(crate) fn new(member: MemberRef, bits: u64, expr: Span, path: Span, elems: u32) -> Value {
        debug_assert_eq!(member.index.0 & SLICE_FLAG, 0);
        Value {
            member_file: member.file,
            member_word: member.index.0,
            bits,
            exprs: vec![expr],
            elem_counts: vec![elems],
            option_paths: vec![path],
            container: None,
        }
    }

    pub(crate) fn member(&self) -> MemberRef {
        MemberRef {
            file: self.member_file,
            index: MemberIndex(self.member_word & !SLICE_FLAG),
        }
    }

    pub(crate) fn holds_slice(&self) -> bool {
        self.member_word & SLICE_FLAG != 0
    }

    pub(crate) fn bits(&self) -> u64 {
        self.bits
    }

    pub(crate) fn slice_index(&self) -> Option<SliceIndex> {
        if self.holds_slice() {
            Some(SliceIndex(self.bits as u32))
        } else {
            None
        }
    }

    pub(crate) fn set_single(&mut self, bits: u64) {
        self.member_word &= !SLICE_FLAG;
        self.bits = bits;
    }

    pub(crate) fn set_slice(&mut self, slice: SliceIndex) {
        self.member_word |= SLICE_FLAG;
        self.bits = slice.0 as u64;
    }

    /// Records that `expr` (spelled via `path`) contributed `elems` further
    /// elements.
    pub(crate) fn push_expr(&mut self, expr: Span, path: Span, elems: u32) {
        let total = self.elem_counts.last().copied().unwrap_or(0) + elems;
        self.exprs.push(expr);
        self.elem_counts.push(total);
        self.option_paths.push(path);
    }

    /// The source expression that produced the `n`-th element, recovered by
    /// binary search over the prefix sums.
    pub(crate) fn source_of_elem(&self, n: u32) -> Span {
        let i = self.elem_counts.partition_point(|&count| count <= n);
        self.exprs[i.min(self.exprs.len() - 1)]
    }

    /// The span the first contribution was written at, for "first set here"
    /// diagnostics.
    pub(crate) fn first_set_at(&self) -> Span {
        self.option_paths.first().copied().unwrap_or_default()
    }
}

/// An evaluated message literal: its values in insertion order plus the
/// conflict-detection map keyed by field FQN (or the oneof FQN for oneof
/// members, so two arms of the same oneof collide).
#[derive(Debug, Default)]
pub(crate) struct MessageValue {
    pub(crate) values: Vec<crate::ir::ValueIndex>,
    pub(crate) by_name: HashMap<InternId, crate::ir::ValueIndex>,
    pub(crate) any: Option<AnyValue>,
}

/// A `google.protobuf.Any` option value with a concrete payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AnyValue {
    pub(crate) type_url: InternId,
    pub(crate) concrete: MessageValueIndex,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> MemberRef {
        MemberRef {
            file: FileSlot::LOCAL,
            index: MemberIndex(7),
        }
    }

    #[test]
    fn slice_flag_round_trips_through_accessors() {
        let mut value = Value::new(member(), 42, Span::default(), Span::default(), 1);
        assert!(!value.holds_slice());
        assert_eq!(value.bits(), 42);
        assert_eq!(value.member().index, MemberIndex(7));

        value.set_slice(SliceIndex(3));
        assert!(value.holds_slice());
        assert_eq!(value.slice_index(), Some(SliceIndex(3)));
        assert_eq!(value.member().index, MemberIndex(7));

        value.set_single(9);
        assert!(!value.holds_slice());
        assert_eq!(value.bits(), 9);
    }

    #[test]
    fn prefix_sums_recover_contributing_expression() {
        let span = |offset: u32| {
            let mut span = Span::default();
            span.start.offset = offset;
            span
        };

        // Three option lines contribute 2, 1 and 3 elements.
        let mut value = Value::new(member(), 0, span(10), span(10), 2);
        value.push_expr(span(20), span(20), 1);
        value.push_expr(span(30), span(30), 3);

        assert_eq!(value.elem_counts.last().copied(), Some(6));
        assert_eq!(value.source_of_elem(0).start.offset, 10);
        assert_eq!(value.source_of_elem(1).start.offset, 10);
        assert_eq!(value.source_of_elem(2).start.offset, 20);
        assert_eq!(value.source_of_elem(3).start.offset, 30);
        assert_eq!(value.source_of_elem(5).start.offset, 30);
    }
}
