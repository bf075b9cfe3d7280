//! Class file writer used by tests to produce real `.class` bytes.
//!
//! Kept free of crate paths so integration tests can pull it in with
//! `#[path = "../src/fixture.rs"]`.

#![allow(dead_code)]

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;

pub const PATH: &str = "Ljavax/ws/rs/Path;";
pub const PROVIDER: &str = "Ljavax/ws/rs/ext/Provider;";

#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    access: u16,
    super_name: String,
    annotations: Vec<(String, bool)>,
    inner_classes: Vec<(String, u16)>,
    field_annotations: Vec<String>,
    inner_classes_first: bool,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: ACC_PUBLIC | ACC_SUPER,
            super_name: "java/lang/Object".to_string(),
            annotations: Vec::new(),
            inner_classes: Vec::new(),
            field_annotations: Vec::new(),
            inner_classes_first: false,
        }
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn annotation(mut self, descriptor: &str) -> Self {
        self.annotations.push((descriptor.to_string(), true));
        self
    }

    pub fn invisible_annotation(mut self, descriptor: &str) -> Self {
        self.annotations.push((descriptor.to_string(), false));
        self
    }

    pub fn inner_class(mut self, name: &str, access: u16) -> Self {
        self.inner_classes.push((name.to_string(), access));
        self
    }

    pub fn field_annotation(mut self, descriptor: &str) -> Self {
        self.field_annotations.push(descriptor.to_string());
        self
    }

    /// Emit `InnerClasses` ahead of the annotation attributes.
    pub fn inner_classes_first(mut self) -> Self {
        self.inner_classes_first = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::new();
        let mut body = Vec::new();

        let this_class = pool.class(&self.name);
        let super_class = pool.class(&self.super_name);
        pool.long(0x7FFF_FFFF_FFFF);

        put_u16(&mut body, self.access);
        put_u16(&mut body, this_class);
        put_u16(&mut body, super_class);
        put_u16(&mut body, 0);

        if self.field_annotations.is_empty() {
            put_u16(&mut body, 0);
        } else {
            put_u16(&mut body, 1);
            put_u16(&mut body, ACC_PRIVATE);
            put_u16(&mut body, pool.utf8("value"));
            put_u16(&mut body, pool.utf8("Ljava/lang/String;"));
            put_u16(&mut body, 1);
            let attr = annotations_attribute(&mut pool, &self.field_annotations);
            put_attribute(&mut body, pool.utf8("RuntimeVisibleAnnotations"), &attr);
        }

        put_u16(&mut body, 1);
        put_u16(&mut body, ACC_PUBLIC);
        put_u16(&mut body, pool.utf8("<init>"));
        put_u16(&mut body, pool.utf8("()V"));
        put_u16(&mut body, 1);
        put_attribute(
            &mut body,
            pool.utf8("Code"),
            &[0, 1, 0, 1, 0, 0, 0, 1, 0xB1, 0, 0, 0, 0],
        );

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        let source = pool.utf8("Fixture.java");
        attributes.push((pool.utf8("SourceFile"), source.to_be_bytes().to_vec()));

        let visible: Vec<String> = self
            .annotations
            .iter()
            .filter(|(_, v)| *v)
            .map(|(d, _)| d.clone())
            .collect();
        let invisible: Vec<String> = self
            .annotations
            .iter()
            .filter(|(_, v)| !*v)
            .map(|(d, _)| d.clone())
            .collect();

        let mut annotation_attrs = Vec::new();
        if !visible.is_empty() {
            let data = annotations_attribute(&mut pool, &visible);
            annotation_attrs.push((pool.utf8("RuntimeVisibleAnnotations"), data));
        }
        if !invisible.is_empty() {
            let data = annotations_attribute(&mut pool, &invisible);
            annotation_attrs.push((pool.utf8("RuntimeInvisibleAnnotations"), data));
        }

        let mut inner_attr = Vec::new();
        if !self.inner_classes.is_empty() {
            let mut data = Vec::new();
            put_u16(&mut data, self.inner_classes.len() as u16);
            for (name, access) in &self.inner_classes {
                let inner = pool.class(name);
                let (outer, simple) = match name.rsplit_once('$') {
                    Some((outer, simple)) => (pool.class(outer), pool.utf8(simple)),
                    None => (0, 0),
                };
                put_u16(&mut data, inner);
                put_u16(&mut data, outer);
                put_u16(&mut data, simple);
                put_u16(&mut data, *access);
            }
            inner_attr.push((pool.utf8("InnerClasses"), data));
        }

        if self.inner_classes_first {
            attributes.extend(inner_attr);
            attributes.extend(annotation_attrs);
        } else {
            attributes.extend(annotation_attrs);
            attributes.extend(inner_attr);
        }

        put_u16(&mut body, attributes.len() as u16);
        for (name, data) in &attributes {
            put_attribute(&mut body, *name, data);
        }

        let mut out = Vec::with_capacity(body.len() + pool.bytes.len() + 10);
        out.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        put_u16(&mut out, 0);
        put_u16(&mut out, 52);
        put_u16(&mut out, pool.count);
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        out
    }
}

struct Pool {
    bytes: Vec<u8>,
    count: u16,
    utf8: HashMap<String, u16>,
}

impl Pool {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            count: 1,
            utf8: HashMap::new(),
        }
    }

    fn utf8(&mut self, s: &str) -> u16 {
        if let Some(idx) = self.utf8.get(s) {
            return *idx;
        }
        let idx = self.count;
        self.bytes.push(1);
        put_u16(&mut self.bytes, s.len() as u16);
        self.bytes.extend_from_slice(s.as_bytes());
        self.count += 1;
        self.utf8.insert(s.to_string(), idx);
        idx
    }

    fn class(&mut self, name: &str) -> u16 {
        let name_idx = self.utf8(name);
        let idx = self.count;
        self.bytes.push(7);
        put_u16(&mut self.bytes, name_idx);
        self.count += 1;
        idx
    }

    fn long(&mut self, value: i64) -> u16 {
        let idx = self.count;
        self.bytes.push(5);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self.count += 2;
        idx
    }
}

/// Each annotation carries `value = {"x"}` and `mode = @Mode` so readers
/// have element values to walk.
fn annotations_attribute(pool: &mut Pool, descriptors: &[String]) -> Vec<u8> {
    let mut data = Vec::new();
    put_u16(&mut data, descriptors.len() as u16);
    for descriptor in descriptors {
        put_u16(&mut data, pool.utf8(descriptor));
        put_u16(&mut data, 2);

        put_u16(&mut data, pool.utf8("value"));
        data.push(b'[');
        put_u16(&mut data, 1);
        data.push(b's');
        put_u16(&mut data, pool.utf8("x"));

        put_u16(&mut data, pool.utf8("mode"));
        data.push(b'@');
        put_u16(&mut data, pool.utf8("Lfixture/Mode;"));
        put_u16(&mut data, 1);
        put_u16(&mut data, pool.utf8("kind"));
        data.push(b'e');
        put_u16(&mut data, pool.utf8("Lfixture/Kind;"));
        put_u16(&mut data, pool.utf8("FAST"));
    }
    data
}

fn put_attribute(out: &mut Vec<u8>, name: u16, data: &[u8]) {
    put_u16(out, name);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}
