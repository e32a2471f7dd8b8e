//! Text rendering of reconstructed values
//!
//! One line per node, children indented two spaces under their parent.
//! Stubs print their target but are not followed, so a segment is only
//! listed when it is the value being rendered.

use avm_values::{Buffer, CodePoint, U256, Value};
use std::fmt::Write;

const INDENT: &str = "  ";

/// Render `value` and everything it holds
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    render_into(value, 0, &mut out);
    out
}

fn line(out: &mut String, depth: usize, text: impl std::fmt::Display) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    // writing to a String cannot fail
    let _ = writeln!(out, "{}", text);
}

fn render_into(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Num(n) => line(out, depth, format_args!("num {}", word(n))),
        Value::Tuple(tuple) => match tuple.elements() {
            Some(elements) => {
                line(out, depth, format_args!("tuple/{}", elements.len()));
                for element in &elements {
                    render_into(element, depth + 1, out);
                }
            }
            None => line(out, depth, "tuple <unresolved>"),
        },
        Value::Buffer(buffer) => render_buffer(buffer, depth, out),
        Value::CodePointStub(stub) => match stub.segment.segment_id() {
            Some(id) => line(out, depth, format_args!("stub segment {} pc {}", id, stub.pc)),
            None => line(out, depth, format_args!("stub segment <unresolved> pc {}", stub.pc)),
        },
        Value::CodeSegment(segment) => {
            let code = segment.load();
            match segment.segment_id() {
                Some(id) => line(
                    out,
                    depth,
                    format_args!("segment {} ({} code points)", id, code.len()),
                ),
                None => line(out, depth, "segment <unresolved>"),
            }
            for (pc, point) in code.iter().enumerate() {
                line(
                    out,
                    depth + 1,
                    format_args!("[{}] op 0x{:02x}", pc, point.op.opcode.0),
                );
                if let Some(immediate) = &point.op.immediate {
                    render_into(immediate, depth + 2, out);
                }
            }
        }
    }
}

fn render_buffer(buffer: &Buffer, depth: usize, out: &mut String) {
    match buffer {
        Buffer::Leaf(bytes) => {
            let text: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            line(out, depth, format_args!("leaf {}", text));
        }
        Buffer::Node {
            depth: tree_depth,
            left,
            right,
        } => {
            line(out, depth, format_args!("buffer depth {}", tree_depth));
            for child in [left, right] {
                match child.get() {
                    Some(child) => render_buffer(&child, depth + 1, out),
                    None => line(out, depth + 1, "buffer <unresolved>"),
                }
            }
        }
    }
}

/// Small words print in decimal, the rest in hex
fn word(n: &U256) -> String {
    match n.to_u64() {
        Some(small) => small.to_string(),
        None => n.to_string(),
    }
}

/// Result of walking a segment's hash chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Intact,
    /// Entry at this pc does not commit to its predecessor
    BrokenAt(usize),
    /// Entry at this pc holds an immediate that is not loaded
    Unresolved(usize),
}

/// Check that every code point commits to the one before it
pub fn check_chain(code: &[CodePoint]) -> ChainStatus {
    let mut expected = U256::ZERO;
    for (pc, point) in code.iter().enumerate() {
        if point.next_hash != expected {
            return ChainStatus::BrokenAt(pc);
        }
        expected = match point.hash() {
            Ok(hash) => hash,
            Err(_) => return ChainStatus::Unresolved(pc),
        };
    }
    ChainStatus::Intact
}
