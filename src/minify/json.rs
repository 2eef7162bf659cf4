use crate::error::TransformError;
use crate::transform::Minifier;
use bytes::{BufMut, BytesMut};

const MAX_DEPTH: usize = 512;

/// Strips insignificant whitespace from a JSON document.
///
/// Strings are copied byte for byte. Bracket nesting is tracked so a body that
/// is not well-formed enough to minify safely is rejected instead of mangled.
#[derive(Debug, Default)]
pub(crate) struct JsonMinifier {
    offset: u64,
    in_string: bool,
    escaped: bool,
    /// Expected closing bracket for every open array or object.
    closers: Vec<u8>,
    /// The last significant byte belonged to a number or literal.
    in_literal: bool,
    /// Whitespace followed that number or literal.
    space_after_literal: bool,
}

impl JsonMinifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn byte(&mut self, b: u8, output: &mut BytesMut) -> Result<(), TransformError> {
        if self.in_string {
            output.put_u8(b);
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
            return Ok(());
        }

        match b {
            b' ' | b'\t' | b'\n' | b'\r' => {
                self.space_after_literal = self.in_literal;
                return Ok(());
            }
            b'"' => self.in_string = true,
            b'{' | b'[' => {
                if self.closers.len() >= MAX_DEPTH {
                    return Err(TransformError::Syntax {
                        offset: self.offset,
                        message: "nesting too deep",
                    });
                }
                self.closers.push(if b == b'{' { b'}' } else { b']' });
            }
            b'}' | b']' => {
                if self.closers.pop() != Some(b) {
                    return Err(TransformError::Unbalanced {
                        offset: self.offset,
                    });
                }
            }
            b',' | b':' => {}
            b if is_literal_byte(b) => {
                // Dropping the space in `1 2` would fuse two values into one.
                if self.space_after_literal {
                    return Err(TransformError::Syntax {
                        offset: self.offset,
                        message: "whitespace between two values",
                    });
                }
                self.in_literal = true;
                output.put_u8(b);
                return Ok(());
            }
            _ => {
                return Err(TransformError::Syntax {
                    offset: self.offset,
                    message: "unexpected byte outside string",
                });
            }
        }

        self.in_literal = false;
        self.space_after_literal = false;
        output.put_u8(b);
        Ok(())
    }
}

impl Minifier for JsonMinifier {
    fn write(&mut self, input: &[u8], output: &mut BytesMut) -> Result<(), TransformError> {
        output.reserve(input.len());
        for &b in input {
            self.byte(b, output)?;
            self.offset += 1;
        }
        Ok(())
    }

    fn finish(&mut self, _output: &mut BytesMut) -> Result<(), TransformError> {
        if self.in_string {
            return Err(TransformError::UnexpectedEof { context: "string" });
        }
        if !self.closers.is_empty() {
            return Err(TransformError::UnexpectedEof {
                context: "array or object",
            });
        }
        Ok(())
    }
}

fn is_literal_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'+')
}
