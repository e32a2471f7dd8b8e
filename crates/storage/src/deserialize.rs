//! Wire-format deserializer
//!
//! Decodes one node's bytes into a [`Value`]. Each node starts with a type
//! code (see [`avm_values::typecode`]):
//!
//! | code | layout |
//! |------|--------|
//! | `NUM` | 32-byte big-endian word |
//! | `BUFFER` | depth byte; depth 0: 32 leaf bytes, else two `HASH_PRE_IMAGE` + hash children |
//! | `CODE_POINT_STUB` | u64 segment id, u64 pc, 32-byte hash |
//! | `CODE_SEGMENT` | u64 segment id, u64 count, then per code point: has-immediate byte, opcode byte, 32-byte next hash, optional immediate value |
//! | `TUPLE + k` | `k` elements, each `HASH_PRE_IMAGE` + hash or an inline value |
//!
//! Integers are big-endian. References to other nodes are never followed:
//! they resolve to placeholders from the session's [`SlotMap`].

use crate::error::DecodeError;
use crate::slot::SlotMap;
use avm_values::typecode::{self, BUFFER, CODE_POINT_STUB, CODE_SEGMENT, HASH_PRE_IMAGE, NUM};
use avm_values::{
    Buffer, BufferRef, CodePoint, CodePointStub, CodeSegment, OpCode, Operation, Tuple, U256, Value,
    segment_id_to_db_hash,
};

/// Inline values nested deeper than this are rejected
pub const MAX_NESTING: usize = 256;

/// Read position over one node's bytes
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.bytes
            .get(self.position)
            .copied()
            .ok_or(DecodeError::UnexpectedEof {
                position: self.position,
                needed: 1,
            })
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = self.peek_u8()?;
        self.position += 1;
        Ok(byte)
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u256(&mut self) -> Result<U256, DecodeError> {
        Ok(U256::from_be_bytes(self.read_array()?))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let remaining = self.remaining();
        if remaining < N {
            return Err(DecodeError::UnexpectedEof {
                position: self.position,
                needed: N - remaining,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.position..self.position + N]);
        self.position += N;
        Ok(out)
    }
}

/// Decode the value at the cursor, registering out-of-line references in
/// `slots`
///
/// On success the cursor sits just past the value. On error the cursor
/// position is unspecified and the session should be abandoned.
pub fn deserialize_value(cursor: &mut Cursor<'_>, slots: &mut SlotMap) -> Result<Value, DecodeError> {
    deserialize_nested(cursor, slots, 0)
}

/// Decode a whole node held in `bytes`
pub fn deserialize_bytes(bytes: &[u8], slots: &mut SlotMap) -> Result<Value, DecodeError> {
    deserialize_value(&mut Cursor::new(bytes), slots)
}

fn deserialize_nested(
    cursor: &mut Cursor<'_>,
    slots: &mut SlotMap,
    depth: usize,
) -> Result<Value, DecodeError> {
    let position = cursor.position();
    if depth >= MAX_NESTING {
        return Err(DecodeError::NestingTooDeep {
            limit: MAX_NESTING,
            position,
        });
    }

    let tag = cursor.read_u8()?;
    match tag {
        NUM => Ok(Value::Num(cursor.read_u256()?)),
        BUFFER => deserialize_buffer(cursor, slots).map(Value::Buffer),
        CODE_POINT_STUB => deserialize_code_point_stub(cursor, slots).map(Value::CodePointStub),
        CODE_SEGMENT => deserialize_code_segment(cursor, slots, depth).map(Value::CodeSegment),
        HASH_PRE_IMAGE => Err(DecodeError::UnexpectedPreImageTag { position }),
        _ => match typecode::tuple_arity(tag) {
            Some(arity) => deserialize_tuple(cursor, slots, arity, depth).map(Value::Tuple),
            None => Err(DecodeError::InvalidTypeCode { tag, position }),
        },
    }
}

fn deserialize_tuple(
    cursor: &mut Cursor<'_>,
    slots: &mut SlotMap,
    arity: usize,
    depth: usize,
) -> Result<Tuple, DecodeError> {
    let tuple = Tuple::sized(arity)?;
    for index in 0..arity {
        let element = if cursor.peek_u8()? == HASH_PRE_IMAGE {
            cursor.read_u8()?;
            let hash = cursor.read_u256()?;
            Value::Tuple(slots.tuple_slot(hash)?)
        } else {
            deserialize_nested(cursor, slots, depth + 1)?
        };
        tuple.set_element(index, element)?;
    }
    Ok(tuple)
}

fn deserialize_buffer(cursor: &mut Cursor<'_>, slots: &mut SlotMap) -> Result<Buffer, DecodeError> {
    let depth = cursor.read_u8()?;
    if depth == 0 {
        return Ok(Buffer::leaf(cursor.read_array()?));
    }

    let left = deserialize_buffer_child(cursor, slots)?;
    let right = deserialize_buffer_child(cursor, slots)?;
    Ok(Buffer::with_depth(depth, left, right))
}

fn deserialize_buffer_child(
    cursor: &mut Cursor<'_>,
    slots: &mut SlotMap,
) -> Result<BufferRef, DecodeError> {
    let position = cursor.position();
    let marker = cursor.read_u8()?;
    if marker != HASH_PRE_IMAGE {
        return Err(DecodeError::UnsupportedInlineBuffer { marker, position });
    }
    let hash = cursor.read_u256()?;
    Ok(slots.buffer_slot(hash)?)
}

fn deserialize_code_point_stub(
    cursor: &mut Cursor<'_>,
    slots: &mut SlotMap,
) -> Result<CodePointStub, DecodeError> {
    let segment_id = cursor.read_u64()?;
    let pc = cursor.read_u64()?;
    let next_hash = cursor.read_u256()?;
    let segment = slots.code_segment_slot(segment_id_to_db_hash(segment_id))?;
    Ok(CodePointStub::new(segment, pc, next_hash))
}

fn deserialize_code_segment(
    cursor: &mut Cursor<'_>,
    slots: &mut SlotMap,
    depth: usize,
) -> Result<CodeSegment, DecodeError> {
    let segment_id = cursor.read_u64()?;
    let count = cursor.read_u64()?;

    // every code point takes at least 34 bytes; a count the input cannot
    // hold gets no up-front reservation and fails with UnexpectedEof below
    const MIN_CODE_POINT_BYTES: u64 = 2 + U256::BYTES as u64;
    let fits = count.saturating_mul(MIN_CODE_POINT_BYTES) <= cursor.remaining() as u64;
    let mut code = Vec::with_capacity(if fits { count as usize } else { 0 });

    for _ in 0..count {
        let has_immediate = cursor.read_u8()? != 0;
        let opcode = OpCode(cursor.read_u8()?);
        let next_hash = cursor.read_u256()?;
        let op = if has_immediate {
            Operation::with_immediate(opcode, deserialize_nested(cursor, slots, depth + 1)?)
        } else {
            Operation::new(opcode)
        };
        code.push(CodePoint::new(op, next_hash));
    }
    Ok(CodeSegment::restore_code_segment(segment_id, code))
}
