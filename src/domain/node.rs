use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Ordered string-keyed mapping. Iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
    index: HashMap<String, usize>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value in place when the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        let key = key.into();
        if let Some(&pos) = self.index.get(&key) {
            self.entries[pos].1 = value;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        let pos = *self.index.get(key)?;
        Some(&mut self.entries[pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Node)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Node)>>(iter: I) -> Self {
        let mut m = Mapping::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Tensor(TensorMeta),
    Value(Leaf),
}

impl From<Mapping> for Node {
    fn from(m: Mapping) -> Self {
        Node::Mapping(m)
    }
}

impl From<TensorMeta> for Node {
    fn from(t: TensorMeta) -> Self {
        Node::Tensor(t)
    }
}

impl From<Leaf> for Node {
    fn from(l: Leaf) -> Self {
        Node::Value(l)
    }
}

pub const DEFAULT_DEVICE: &str = "cpu";

/// Shape and element type of a tensor; the data itself is never held.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorMeta {
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub device: String,
}

impl TensorMeta {
    pub fn new(shape: Vec<usize>, dtype: DType) -> Self {
        Self {
            shape,
            dtype,
            device: DEFAULT_DEVICE.to_string(),
        }
    }

    /// Product of the dimensions. A zero-dimensional tensor holds one element.
    /// `None` when the product does not fit in a `u64`.
    pub fn element_count(&self) -> Option<u64> {
        if self.shape.contains(&0) {
            return Some(0);
        }
        self.shape
            .iter()
            .try_fold(1u64, |acc, d| acc.checked_mul(*d as u64))
    }

    pub fn checked_size_bytes(&self) -> Option<u64> {
        self.element_count()?.checked_mul(self.dtype.byte_width())
    }

    /// Saturates at `u64::MAX`; the loader rejects tensors that would.
    pub fn size_bytes(&self) -> u64 {
        self.checked_size_bytes().unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F16,
    BF16,
    F32,
    F64,
    F8E4M3,
    F8E5M2,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::U8 => "uint8",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::U16 => "uint16",
            DType::I32 => "int32",
            DType::U32 => "uint32",
            DType::I64 => "int64",
            DType::U64 => "uint64",
            DType::F16 => "float16",
            DType::BF16 => "bfloat16",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::F8E4M3 => "float8_e4m3fn",
            DType::F8E5M2 => "float8_e5m2",
        }
    }

    pub fn byte_width(self) -> u64 {
        match self {
            DType::Bool | DType::U8 | DType::I8 | DType::F8E4M3 | DType::F8E5M2 => 1,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("unknown dtype: {0}")]
pub struct UnknownDType(pub String);

impl FromStr for DType {
    type Err = UnknownDType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        let s = s.strip_prefix("torch.").unwrap_or(s).to_ascii_lowercase();
        let dtype = match s.as_str() {
            "bool" => DType::Bool,
            "uint8" | "u8" => DType::U8,
            "int8" | "i8" => DType::I8,
            "int16" | "i16" | "short" => DType::I16,
            "uint16" | "u16" => DType::U16,
            "int32" | "i32" | "int" => DType::I32,
            "uint32" | "u32" => DType::U32,
            "int64" | "i64" | "long" => DType::I64,
            "uint64" | "u64" => DType::U64,
            "float16" | "f16" | "half" => DType::F16,
            "bfloat16" | "bf16" => DType::BF16,
            "float32" | "f32" | "float" => DType::F32,
            "float64" | "f64" | "double" => DType::F64,
            "float8_e4m3fn" | "f8_e4m3" => DType::F8E4M3,
            "float8_e5m2" | "f8_e5m2" => DType::F8E5M2,
            _ => return Err(UnknownDType(raw.to_string())),
        };
        Ok(dtype)
    }
}

impl TryFrom<safetensors::Dtype> for DType {
    type Error = UnknownDType;

    fn try_from(d: safetensors::Dtype) -> Result<Self, Self::Error> {
        use safetensors::Dtype as St;
        Ok(match d {
            St::BOOL => DType::Bool,
            St::U8 => DType::U8,
            St::I8 => DType::I8,
            St::I16 => DType::I16,
            St::U16 => DType::U16,
            St::I32 => DType::I32,
            St::U32 => DType::U32,
            St::I64 => DType::I64,
            St::U64 => DType::U64,
            St::F16 => DType::F16,
            St::BF16 => DType::BF16,
            St::F32 => DType::F32,
            St::F64 => DType::F64,
            St::F8_E4M3 => DType::F8E4M3,
            St::F8_E5M2 => DType::F8E5M2,
            other => return Err(UnknownDType(format!("{:?}", other))),
        })
    }
}

// Shallow size model used for opaque values, after CPython's getsizeof.
const NONE_SIZE: u64 = 16;
const INT_BASE_SIZE: u64 = 24;
const INT_DIGIT_SIZE: u64 = 4;
const FLOAT_SIZE: u64 = 24;
const STR_BASE_SIZE: u64 = 49;
const LIST_BASE_SIZE: u64 = 56;
const LIST_SLOT_SIZE: u64 = 8;
const CALLABLE_SIZE: u64 = 144;
const OBJECT_SIZE: u64 = 56;

/// Any non-mapping, non-tensor value found in a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Leaf>),
    Callable { name: String },
    Object { type_name: String, repr: String },
}

impl Leaf {
    pub fn type_name(&self) -> &str {
        match self {
            Leaf::None => "NoneType",
            Leaf::Bool(_) => "bool",
            Leaf::Int(_) => "int",
            Leaf::Float(_) => "float",
            Leaf::Str(_) => "str",
            Leaf::List(_) => "list",
            Leaf::Callable { .. } => "function",
            Leaf::Object { type_name, .. } => type_name,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Leaf::Callable { .. })
    }

    pub fn estimated_size(&self) -> u64 {
        match self {
            Leaf::None => NONE_SIZE,
            Leaf::Bool(_) => INT_BASE_SIZE + INT_DIGIT_SIZE,
            Leaf::Int(v) => {
                let bits = 64 - v.unsigned_abs().leading_zeros() as u64;
                let digits = bits.div_ceil(30).max(1);
                INT_BASE_SIZE + INT_DIGIT_SIZE * digits
            }
            Leaf::Float(_) => FLOAT_SIZE,
            Leaf::Str(s) => STR_BASE_SIZE + s.len() as u64,
            Leaf::List(items) => LIST_BASE_SIZE + LIST_SLOT_SIZE * items.len() as u64,
            Leaf::Callable { .. } => CALLABLE_SIZE,
            Leaf::Object { .. } => OBJECT_SIZE,
        }
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>, nested: bool) -> fmt::Result {
        match self {
            Leaf::Str(s) if nested => write!(f, "'{}'", s),
            Leaf::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f, true)?;
                }
                f.write_str("]")
            }
            other => fmt::Display::fmt(other, f),
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::None => f.write_str("None"),
            Leaf::Bool(true) => f.write_str("True"),
            Leaf::Bool(false) => f.write_str("False"),
            Leaf::Int(v) => write!(f, "{}", v),
            Leaf::Float(v) => write_float(f, *v),
            Leaf::Str(s) => f.write_str(s),
            Leaf::List(_) => self.write_repr(f, false),
            Leaf::Callable { name } => write!(f, "<function {}>", name),
            Leaf::Object { repr, .. } => f.write_str(repr),
        }
    }
}

/// Python `repr` of a float: scientific notation outside `1e-4 <= |v| < 1e16`,
/// with a signed two-digit exponent.
fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
    }
    let sci = format!("{:e}", v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if v != 0.0 && !(-4..16).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        write!(f, "{}e{}{:02}", mantissa, sign, exp.unsigned_abs())
    } else if v.fract() == 0.0 {
        write!(f, "{:.1}", v)
    } else {
        write!(f, "{}", v)
    }
}
