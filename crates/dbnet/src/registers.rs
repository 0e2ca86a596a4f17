// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed register values and the read request/response wire formats.
//!
//! # Type Descriptors
//!
//! Register types are written as `M?<letter>[rows,cols]?`:
//!
//! | Descriptor | Meaning |
//! |-----------|----------------------------|
//! | `I`       | scalar u16 |
//! | `L`       | scalar u32 |
//! | `F`       | scalar f32 |
//! | `MF[25,1]`| 25x1 matrix of f32 |
//!
//! The `M` prefix requires bracketed dimensions, and dimensions are only
//! valid with the prefix.
//!
//! # Wire Type Code
//!
//! The low two bits select the element kind (0 = u16, 1 = u32, 2 = f32);
//! bit 0x20 marks a matrix.
//!
//! # Read Request (12 bytes, little-endian fields)
//!
//! ```text
//! +------+-----------+-------------------+------------+------------+------+------+
//! | 0x01 | type code | register id (u16) | row offset | col offset | rows | cols |
//! +------+-----------+-------------------+------------+------------+------+------+
//! ```
//!
//! Only matrix reads exist on the wire. The carrying frame uses message
//! id [`READ_REQUEST_MSG_ID`].
//!
//! # Read Response
//!
//! A status byte `0x81` followed by exactly `element_size * rows * cols`
//! bytes of little-endian elements in row-major order.

use std::fmt;

/// Mask selecting the element kind bits of a type code.
pub const TYPE_MASK: u8 = 0x03;

/// Matrix marker bit of a type code.
pub const MATRIX_MASK: u8 = 0x20;

/// Frame message id used by read requests.
pub const READ_REQUEST_MSG_ID: u8 = 0x4D;

/// Encoded size of a read request.
pub const READ_REQUEST_SIZE: usize = 12;

const READ_REQUEST_TAG: u8 = 0x01;
const READ_RESPONSE_TAG: u8 = 0x81;

/// Error in register type handling or request/response codecs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// Malformed type descriptor string.
    InvalidTypeDescriptor(String),
    /// Unknown element kind bits in a wire type code.
    UnknownTypeCode(u8),
    /// The operation needs a matrix-shaped register type.
    UnsupportedType,
    /// Request bytes do not start with the request tag.
    InvalidRequest,
    /// Response bytes do not start with the response status byte.
    InvalidResponse,
    /// Declared and actual byte or element counts disagree.
    LengthMismatch,
    /// Element kinds of a value block and its destination differ.
    KindMismatch,
    /// No batch plan fits the transfer size limit.
    MatrixTooLarge,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTypeDescriptor(s) => write!(f, "invalid type descriptor: {s:?}"),
            Self::UnknownTypeCode(code) => write!(f, "unknown type code: {code:#04x}"),
            Self::UnsupportedType => write!(f, "only matrix registers can be read"),
            Self::InvalidRequest => write!(f, "read request has an invalid start byte"),
            Self::InvalidResponse => write!(f, "read response has an invalid status byte"),
            Self::LengthMismatch => write!(f, "register data length mismatch"),
            Self::KindMismatch => write!(f, "element kind mismatch"),
            Self::MatrixTooLarge => write!(f, "matrix has no viable batch plan"),
        }
    }
}

impl std::error::Error for RegisterError {}

/// Element kind of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 16-bit unsigned integer, descriptor letter `I`.
    U16,
    /// 32-bit unsigned integer, descriptor letter `L`.
    U32,
    /// 32-bit float, descriptor letter `F`.
    F32,
}

impl ElementKind {
    /// Wire element size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    /// Kind bits of the wire type code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::U16 => 0x00,
            Self::U32 => 0x01,
            Self::F32 => 0x02,
        }
    }

    /// Descriptor letter.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::U16 => 'I',
            Self::U32 => 'L',
            Self::F32 => 'F',
        }
    }

    /// Kind from the low bits of a wire type code.
    pub fn from_code(code: u8) -> Result<Self, RegisterError> {
        match code & TYPE_MASK {
            0x00 => Ok(Self::U16),
            0x01 => Ok(Self::U32),
            0x02 => Ok(Self::F32),
            _ => Err(RegisterError::UnknownTypeCode(code)),
        }
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'I' => Some(Self::U16),
            'L' => Some(Self::U32),
            'F' => Some(Self::F32),
            _ => None,
        }
    }
}

/// A register's element kind plus optional matrix shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterType {
    /// Element kind.
    pub kind: ElementKind,
    /// `(rows, cols)` for matrix registers, `None` for scalars.
    pub shape: Option<(u16, u16)>,
}

impl RegisterType {
    /// Parse a descriptor string such as `F` or `MF[25,1]`.
    pub fn parse(descriptor: &str) -> Result<Self, RegisterError> {
        let invalid = || RegisterError::InvalidTypeDescriptor(descriptor.to_string());

        let (matrix, rest) = match descriptor.strip_prefix('M') {
            Some(rest) => (true, rest),
            None => (false, descriptor),
        };

        let mut chars = rest.chars();
        let kind = chars
            .next()
            .and_then(ElementKind::from_letter)
            .ok_or_else(invalid)?;
        let rest = chars.as_str();

        if !matrix {
            if !rest.is_empty() {
                return Err(invalid());
            }
            return Ok(Self { kind, shape: None });
        }

        let dims = rest
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(invalid)?;
        let (rows, cols) = dims.split_once(',').ok_or_else(invalid)?;
        let rows: u16 = rows.parse().map_err(|_| invalid())?;
        let cols: u16 = cols.parse().map_err(|_| invalid())?;
        if rows == 0 || cols == 0 {
            return Err(invalid());
        }

        Ok(Self {
            kind,
            shape: Some((rows, cols)),
        })
    }

    /// Wire type code byte.
    #[must_use]
    pub const fn code(&self) -> u8 {
        let code = self.kind.code();
        if self.shape.is_some() {
            code | MATRIX_MASK
        } else {
            code
        }
    }

    /// Whether this is a matrix type.
    #[must_use]
    pub const fn is_matrix(&self) -> bool {
        self.shape.is_some()
    }

    /// Total byte size of the full register value.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self.shape {
            Some((rows, cols)) => usize::from(rows) * usize::from(cols) * self.kind.size(),
            None => self.kind.size(),
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            Some((rows, cols)) => write!(f, "M{}[{},{}]", self.kind.letter(), rows, cols),
            None => write!(f, "{}", self.kind.letter()),
        }
    }
}

/// A kind-tagged block of elements in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl Values {
    /// Element kind of the block.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::U16(_) => ElementKind::U16,
            Self::U32(_) => ElementKind::U32,
            Self::F32(_) => ElementKind::F32,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-filled block of `count` elements.
    #[must_use]
    pub fn zeroed(kind: ElementKind, count: usize) -> Self {
        match kind {
            ElementKind::U16 => Self::U16(vec![0; count]),
            ElementKind::U32 => Self::U32(vec![0; count]),
            ElementKind::F32 => Self::F32(vec![0.0; count]),
        }
    }
}

/// A decoded matrix value in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    /// Row count.
    pub rows: u16,
    /// Column count.
    pub cols: u16,
    /// Elements, `rows * cols` of them.
    pub values: Values,
}

impl Matrix {
    /// Zero-filled matrix.
    #[must_use]
    pub fn zeroed(kind: ElementKind, rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            values: Values::zeroed(kind, usize::from(rows) * usize::from(cols)),
        }
    }

    /// Flat row-major index of `(row, col)`.
    #[inline]
    #[must_use]
    pub fn index(&self, row: u16, col: u16) -> usize {
        usize::from(row) * usize::from(self.cols) + usize::from(col)
    }
}

/// A typed matrix-block read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Register (word) identifier.
    pub register_id: u16,
    /// Full register type; must be matrix-shaped.
    pub ty: RegisterType,
    /// First row of the requested block.
    pub row_offset: u16,
    /// First column of the requested block.
    pub col_offset: u16,
    /// Rows in the requested block.
    pub rows: u16,
    /// Columns in the requested block.
    pub cols: u16,
}

impl ReadRequest {
    /// Create a request; fails with `UnsupportedType` unless `ty` is a
    /// matrix type.
    pub fn new(
        register_id: u16,
        ty: RegisterType,
        row_offset: u16,
        col_offset: u16,
        rows: u16,
        cols: u16,
    ) -> Result<Self, RegisterError> {
        if !ty.is_matrix() {
            return Err(RegisterError::UnsupportedType);
        }
        Ok(Self {
            register_id,
            ty,
            row_offset,
            col_offset,
            rows,
            cols,
        })
    }

    /// Encode to the 12-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; READ_REQUEST_SIZE] {
        let id = self.register_id.to_le_bytes();
        let i0 = self.row_offset.to_le_bytes();
        let j0 = self.col_offset.to_le_bytes();
        let rows = self.rows.to_le_bytes();
        let cols = self.cols.to_le_bytes();
        [
            READ_REQUEST_TAG,
            self.ty.code(),
            id[0],
            id[1],
            i0[0],
            i0[1],
            j0[0],
            j0[1],
            rows[0],
            rows[1],
            cols[0],
            cols[1],
        ]
    }

    /// Decode from the 12-byte wire form (server side).
    pub fn decode(data: &[u8]) -> Result<Self, RegisterError> {
        if data.len() != READ_REQUEST_SIZE {
            return Err(RegisterError::LengthMismatch);
        }
        if data[0] != READ_REQUEST_TAG {
            return Err(RegisterError::InvalidRequest);
        }
        if data[1] & MATRIX_MASK != MATRIX_MASK {
            return Err(RegisterError::UnsupportedType);
        }

        let kind = ElementKind::from_code(data[1])?;
        let register_id = u16::from_le_bytes([data[2], data[3]]);
        let row_offset = u16::from_le_bytes([data[4], data[5]]);
        let col_offset = u16::from_le_bytes([data[6], data[7]]);
        let rows = u16::from_le_bytes([data[8], data[9]]);
        let cols = u16::from_le_bytes([data[10], data[11]]);

        Ok(Self {
            register_id,
            ty: RegisterType {
                kind,
                shape: Some((rows, cols)),
            },
            row_offset,
            col_offset,
            rows,
            cols,
        })
    }
}

impl fmt::Display for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read WID {} ({}), {}x{} items from {},{}",
            self.register_id, self.ty, self.rows, self.cols, self.row_offset, self.col_offset
        )
    }
}

/// A decoded read response block.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    /// Elements of the requested block, row-major.
    pub values: Values,
}

impl ReadResponse {
    /// Decode response bytes against the request that produced them.
    pub fn decode(data: &[u8], request: &ReadRequest) -> Result<Self, RegisterError> {
        if data.is_empty() || data[0] != READ_RESPONSE_TAG {
            return Err(RegisterError::InvalidResponse);
        }

        let kind = request.ty.kind;
        let count = usize::from(request.rows) * usize::from(request.cols);
        let body = &data[1..];
        if body.len() != kind.size() * count {
            return Err(RegisterError::LengthMismatch);
        }

        let values = match kind {
            ElementKind::U16 => Values::U16(
                body.chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            ElementKind::U32 => Values::U32(
                body.chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            ElementKind::F32 => Values::F32(
                body.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        };

        Ok(Self { values })
    }

    /// Encode a response block (server side).
    #[must_use]
    pub fn encode(values: &Values) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + values.len() * values.kind().size());
        out.push(READ_RESPONSE_TAG);
        match values {
            Values::U16(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
            Values::U32(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
            Values::F32(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
        }
        out
    }
}
