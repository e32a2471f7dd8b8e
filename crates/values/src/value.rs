use crate::buffer::Buffer;
use crate::code::{CodePointStub, CodeSegment};
use crate::error::ValueError;
use crate::hash::sha256;
use crate::tuple::Tuple;
use crate::typecode;
use crate::uint256::U256;

/// Value: what the machine computes over
///
/// A closed set of variants. Tuples, buffer children and code segments are
/// shared handles, so cloning a `Value` is cheap and aliases the same
/// backing records.
///
/// # Reference Cycles
///
/// Values only point at values that were built (or decoded) before them, and
/// the store addresses nodes by the hash of their contents, so a node cannot
/// reach itself. Reference counts therefore always drain to zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 256-bit number
    Num(U256),

    /// Fixed-arity sequence of 0 to 8 values
    Tuple(Tuple),

    /// Binary tree of 32-byte leaves
    Buffer(Buffer),

    /// One instruction position within a code segment
    CodePointStub(CodePointStub),

    /// Growable instruction list
    CodeSegment(CodeSegment),
}

impl Default for Value {
    fn default() -> Self {
        Value::Num(U256::ZERO)
    }
}

impl Value {
    /// Variant name, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "num",
            Value::Tuple(_) => "tuple",
            Value::Buffer(_) => "buffer",
            Value::CodePointStub(_) => "code point stub",
            Value::CodeSegment(_) => "code segment",
        }
    }

    /// Content hash of the value
    ///
    /// Fails with [`ValueError::Unresolved`] if any reachable placeholder
    /// has not been filled yet.
    pub fn hash(&self) -> Result<U256, ValueError> {
        match self {
            Value::Num(n) => Ok(sha256(&[&[typecode::NUM], n.as_bytes()])),
            Value::Tuple(tuple) => tuple.content_hash(),
            Value::Buffer(buffer) => buffer.content_hash(),
            Value::CodePointStub(stub) => Ok(stub.next_hash),
            Value::CodeSegment(segment) => segment.hash().ok_or(ValueError::Unresolved),
        }
    }
}

impl From<U256> for Value {
    fn from(n: U256) -> Self {
        Value::Num(n)
    }
}

impl From<Tuple> for Value {
    fn from(tuple: Tuple) -> Self {
        Value::Tuple(tuple)
    }
}

impl From<Buffer> for Value {
    fn from(buffer: Buffer) -> Self {
        Value::Buffer(buffer)
    }
}

impl From<CodePointStub> for Value {
    fn from(stub: CodePointStub) -> Self {
        Value::CodePointStub(stub)
    }
}

impl From<CodeSegment> for Value {
    fn from(segment: CodeSegment) -> Self {
        Value::CodeSegment(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferRef;

    #[test]
    fn test_num_hash_is_deterministic() {
        let a = Value::from(U256::from_u64(3));
        let b = Value::from(U256::from_u64(3));
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), Value::from(U256::from_u64(4)).hash());
    }

    #[test]
    fn test_tuple_hash_depends_on_arity() {
        let empty = Value::from(Tuple::new(vec![]).unwrap());
        let one = Value::from(Tuple::new(vec![Value::default()]).unwrap());
        assert_ne!(empty.hash().unwrap(), one.hash().unwrap());
    }

    #[test]
    fn test_structurally_equal_tuples_hash_equal() {
        let a = Tuple::new(vec![Value::from(U256::from_u64(1))]).unwrap();
        let b = Tuple::new(vec![Value::from(U256::from_u64(1))]).unwrap();
        assert!(!a.ptr_eq(&b));
        assert_eq!(Value::from(a).hash(), Value::from(b).hash());
    }

    #[test]
    fn test_placeholder_hash_is_unresolved() {
        let pending = Value::from(Tuple::uninitialized());
        assert_eq!(pending.hash(), Err(ValueError::Unresolved));

        let nested = Value::from(Tuple::new(vec![pending]).unwrap());
        assert_eq!(nested.hash(), Err(ValueError::Unresolved));

        let buffer = Value::from(Buffer::node(
            BufferRef::uninitialized(),
            BufferRef::new(Buffer::default()),
        ));
        assert_eq!(buffer.hash(), Err(ValueError::Unresolved));
        assert_eq!(
            Value::from(CodeSegment::uninitialized()).hash(),
            Err(ValueError::Unresolved)
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::default().kind_name(), "num");
        assert_eq!(Value::from(Tuple::uninitialized()).kind_name(), "tuple");
        assert_eq!(Value::from(Buffer::default()).kind_name(), "buffer");
    }
}
