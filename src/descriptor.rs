//! Structural class file reader.
//!
//! Walks a compiled class record far enough to report the header, the
//! class-level annotations and the `InnerClasses` entries as a flat list of
//! [`ClassEvent`]s. Field and method bodies, code and every other attribute
//! are skipped by their declared lengths without being interpreted.

use crate::error::ReadError;

const MAGIC: u32 = 0xCAFE_BABE;
const MAX_ELEMENT_DEPTH: usize = 64;

const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
const INNER_CLASSES: &str = "InnerClasses";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassEvent {
    Header {
        minor_version: u16,
        major_version: u16,
        access: u16,
        name: String,
        super_name: Option<String>,
    },
    Annotation {
        descriptor: String,
        visible: bool,
    },
    InnerClass {
        name: String,
        outer_name: Option<String>,
        inner_name: Option<String>,
        access: u16,
    },
    End,
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    Other,
    Unusable,
}

pub struct ClassReader<'a> {
    data: &'a [u8],
}

impl<'a> ClassReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Parse the whole record. Events are in file order and always end with
    /// [`ClassEvent::End`]; any structural error discards the partial list.
    pub fn read_events(&self) -> Result<Vec<ClassEvent>, ReadError> {
        let mut r = Bytes::new(self.data);

        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ReadError::BadMagic(magic));
        }
        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let pool = ConstantPool::read(&mut r)?;

        let access = r.u16()?;
        let name = pool.class_name(r.u16()?)?.to_string();
        let super_name = pool.optional_class_name(r.u16()?)?.map(str::to_string);

        let interfaces = r.u16()? as usize;
        r.skip(interfaces * 2)?;

        let mut events = vec![ClassEvent::Header {
            minor_version,
            major_version,
            access,
            name,
            super_name,
        }];

        // fields, then methods
        for _ in 0..2 {
            let count = r.u16()?;
            for _ in 0..count {
                r.skip(6)?;
                skip_attributes(&mut r)?;
            }
        }

        let count = r.u16()?;
        for _ in 0..count {
            let attribute = pool.utf8(r.u16()?)?;
            let length = r.u32()? as usize;
            let body = r.take(length)?;
            match attribute {
                RUNTIME_VISIBLE_ANNOTATIONS => {
                    read_annotations(&pool, attribute, body, true, &mut events)?
                }
                RUNTIME_INVISIBLE_ANNOTATIONS => {
                    read_annotations(&pool, attribute, body, false, &mut events)?
                }
                INNER_CLASSES => read_inner_classes(&pool, body, &mut events)?,
                _ => {}
            }
        }

        if r.remaining() > 0 {
            return Err(ReadError::TrailingBytes(r.remaining()));
        }

        events.push(ClassEvent::End);
        Ok(events)
    }
}

fn skip_attributes(r: &mut Bytes<'_>) -> Result<(), ReadError> {
    let count = r.u16()?;
    for _ in 0..count {
        r.skip(2)?;
        let length = r.u32()? as usize;
        r.skip(length)?;
    }
    Ok(())
}

fn read_annotations(
    pool: &ConstantPool,
    attribute: &str,
    body: &[u8],
    visible: bool,
    events: &mut Vec<ClassEvent>,
) -> Result<(), ReadError> {
    let mut r = Bytes::new(body);
    let count = r.u16()?;
    for _ in 0..count {
        let descriptor = pool.utf8(r.u16()?)?.to_string();
        skip_element_pairs(&mut r, 0)?;
        events.push(ClassEvent::Annotation {
            descriptor,
            visible,
        });
    }
    expect_consumed(attribute, &r)
}

fn skip_element_pairs(r: &mut Bytes<'_>, depth: usize) -> Result<(), ReadError> {
    let pairs = r.u16()?;
    for _ in 0..pairs {
        r.skip(2)?;
        skip_element_value(r, depth)?;
    }
    Ok(())
}

fn skip_element_value(r: &mut Bytes<'_>, depth: usize) -> Result<(), ReadError> {
    if depth >= MAX_ELEMENT_DEPTH {
        return Err(ReadError::NestingTooDeep(MAX_ELEMENT_DEPTH));
    }
    match r.u8()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => r.skip(2),
        b'e' => r.skip(4),
        b'@' => {
            r.skip(2)?;
            skip_element_pairs(r, depth + 1)
        }
        b'[' => {
            let values = r.u16()?;
            for _ in 0..values {
                skip_element_value(r, depth + 1)?;
            }
            Ok(())
        }
        tag => Err(ReadError::UnknownElementTag(tag as char)),
    }
}

fn read_inner_classes(
    pool: &ConstantPool,
    body: &[u8],
    events: &mut Vec<ClassEvent>,
) -> Result<(), ReadError> {
    let mut r = Bytes::new(body);
    let count = r.u16()?;
    for _ in 0..count {
        let name = pool.class_name(r.u16()?)?.to_string();
        let outer_name = pool.optional_class_name(r.u16()?)?.map(str::to_string);
        let inner_name = match r.u16()? {
            0 => None,
            idx => Some(pool.utf8(idx)?.to_string()),
        };
        let access = r.u16()?;
        events.push(ClassEvent::InnerClass {
            name,
            outer_name,
            inner_name,
            access,
        });
    }
    expect_consumed(INNER_CLASSES, &r)
}

fn expect_consumed(attribute: &str, r: &Bytes<'_>) -> Result<(), ReadError> {
    if r.remaining() == 0 {
        return Ok(());
    }
    Err(ReadError::AttributeLength {
        attribute: attribute.to_string(),
        declared: r.data.len(),
        consumed: r.pos,
    })
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn read(r: &mut Bytes<'_>) -> Result<Self, ReadError> {
        let count = r.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut index = 1u16;
        while index < count {
            let tag = r.u8()?;
            let entry = match tag {
                1 => {
                    let len = r.u16()? as usize;
                    Constant::Utf8(decode_modified_utf8(r.take(len)?))
                }
                7 => Constant::Class(r.u16()?),
                3 | 4 => {
                    r.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    // longs and doubles take two slots
                    r.skip(8)?;
                    entries.push(Constant::Other);
                    entries.push(Constant::Unusable);
                    index = index.saturating_add(2);
                    continue;
                }
                8 | 16 | 19 | 20 => {
                    r.skip(2)?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    r.skip(4)?;
                    Constant::Other
                }
                15 => {
                    r.skip(3)?;
                    Constant::Other
                }
                tag => return Err(ReadError::UnknownConstantTag { index, tag }),
            };
            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn utf8(&self, index: u16) -> Result<&str, ReadError> {
        match self.entries.get(index as usize) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ReadError::BadConstantIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ReadError> {
        match self.entries.get(index as usize) {
            Some(Constant::Class(name_index)) => self.utf8(*name_index),
            _ => Err(ReadError::BadConstantIndex {
                index,
                expected: "Class",
            }),
        }
    }

    fn optional_class_name(&self, index: u16) -> Result<Option<&str>, ReadError> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }
}

/// Class files store strings as "modified UTF-8": NUL is `C0 80` and
/// supplementary characters are encoded surrogate halves.
fn decode_modified_utf8(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            units.push(((b as u16 & 0x1F) << 6) | (bytes[i + 1] as u16 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            units.push(
                ((b as u16 & 0x0F) << 12)
                    | ((bytes[i + 1] as u16 & 0x3F) << 6)
                    | (bytes[i + 2] as u16 & 0x3F),
            );
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Bytes<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if n > self.remaining() {
            return Err(ReadError::Truncated {
                offset: self.pos,
                needed: n,
            });
        }
        let data = self.data;
        let slice = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), ReadError> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ReadError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ReadError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
