// modlink-core/src/module/classfile.rs
//! Reading and writing `module-info.class`.
//!
//! Only the parts of the class-file format that a module descriptor needs are
//! interpreted: the constant pool and the `Module`, `ModulePackages` and
//! `ModuleMainClass` attributes. Every other structure is skipped by length.

use std::collections::{BTreeSet, HashMap};

use modlink_common::model::{ModuleDescriptor, RequiresModifiers};
use thiserror::Error;

const MAGIC: u32 = 0xCAFE_BABE;
const ACC_MODULE: u16 = 0x8000;
const ACC_OPEN: u16 = 0x0020;
const JAVA_9_MAJOR: u16 = 53;

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ClassFormatError(String);

type ClassResult<T> = std::result::Result<T, ClassFormatError>;

fn malformed<T>(message: impl Into<String>) -> ClassResult<T> {
    Err(ClassFormatError(message.into()))
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    Module(u16),
    Package(u16),
    Other,
    // Second slot of a long or double.
    Unusable,
}

struct ClassReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> ClassResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => malformed(format!("unexpected end of class file at offset {}", self.pos)),
        }
    }

    fn u1(&mut self) -> ClassResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> ClassResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> ClassResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip_members(&mut self) -> ClassResult<()> {
        let count = self.u2()?;
        for _ in 0..count {
            self.take(6)?;
            self.skip_attributes()?;
        }
        Ok(())
    }

    fn skip_attributes(&mut self) -> ClassResult<()> {
        let count = self.u2()?;
        for _ in 0..count {
            self.take(2)?;
            let len = self.u4()? as usize;
            self.take(len)?;
        }
        Ok(())
    }
}

struct Pool(Vec<Constant>);

impl Pool {
    fn parse(reader: &mut ClassReader<'_>) -> ClassResult<Self> {
        let count = reader.u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);
        while entries.len() < count {
            let tag = reader.u1()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = reader.u2()? as usize;
                    Constant::Utf8(String::from_utf8_lossy(reader.take(len)?).into_owned())
                }
                TAG_CLASS => Constant::Class(reader.u2()?),
                TAG_MODULE => Constant::Module(reader.u2()?),
                TAG_PACKAGE => Constant::Package(reader.u2()?),
                3 | 4 => {
                    reader.take(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    reader.take(8)?;
                    entries.push(Constant::Other);
                    Constant::Unusable
                }
                8 | 16 => {
                    reader.take(2)?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.take(4)?;
                    Constant::Other
                }
                15 => {
                    reader.take(3)?;
                    Constant::Other
                }
                other => return malformed(format!("unknown constant pool tag {other}")),
            };
            entries.push(constant);
        }
        Ok(Self(entries))
    }

    fn get(&self, index: u16) -> ClassResult<&Constant> {
        match self.0.get(index as usize) {
            Some(constant) if index != 0 => Ok(constant),
            _ => malformed(format!("constant pool index {index} out of range")),
        }
    }

    fn utf8(&self, index: u16) -> ClassResult<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            other => malformed(format!("expected Utf8 at #{index}, found {other:?}")),
        }
    }

    fn class_name(&self, index: u16) -> ClassResult<String> {
        match self.get(index)? {
            Constant::Class(name) => Ok(self.utf8(*name)?.replace('/', ".")),
            other => malformed(format!("expected Class at #{index}, found {other:?}")),
        }
    }

    fn module_name(&self, index: u16) -> ClassResult<String> {
        match self.get(index)? {
            Constant::Module(name) => Ok(self.utf8(*name)?.to_string()),
            other => malformed(format!("expected Module at #{index}, found {other:?}")),
        }
    }

    fn package_name(&self, index: u16) -> ClassResult<String> {
        match self.get(index)? {
            Constant::Package(name) => Ok(self.utf8(*name)?.replace('/', ".")),
            other => malformed(format!("expected Package at #{index}, found {other:?}")),
        }
    }
}

/// Parses the bytes of a `module-info.class`.
///
/// Qualified `exports ... to` and `opens ... to` clauses only contribute their
/// package to `packages`, since they do not widen the module's public surface.
pub fn parse_module_info(bytes: &[u8]) -> ClassResult<ModuleDescriptor> {
    let mut reader = ClassReader::new(bytes);
    if reader.u4()? != MAGIC {
        return malformed("bad magic number");
    }
    let _minor = reader.u2()?;
    let _major = reader.u2()?;
    let pool = Pool::parse(&mut reader)?;

    let access_flags = reader.u2()?;
    if access_flags & ACC_MODULE == 0 {
        return malformed("class is not a module descriptor (ACC_MODULE not set)");
    }
    let _this_class = reader.u2()?;
    let _super_class = reader.u2()?;
    let interfaces = reader.u2()? as usize;
    reader.take(interfaces * 2)?;
    reader.skip_members()?;
    reader.skip_members()?;

    let mut descriptor: Option<ModuleDescriptor> = None;
    let mut packages = BTreeSet::new();
    let mut main_class = None;

    let attributes = reader.u2()?;
    for _ in 0..attributes {
        let name = pool.utf8(reader.u2()?)?.to_string();
        let len = reader.u4()? as usize;
        let body = reader.take(len)?;
        let mut attr = ClassReader::new(body);
        match name.as_str() {
            "Module" => descriptor = Some(parse_module_attribute(&mut attr, &pool)?),
            "ModulePackages" => {
                let count = attr.u2()?;
                for _ in 0..count {
                    packages.insert(pool.package_name(attr.u2()?)?);
                }
            }
            "ModuleMainClass" => main_class = Some(pool.class_name(attr.u2()?)?),
            _ => {}
        }
    }

    let Some(mut descriptor) = descriptor else {
        return malformed("missing Module attribute");
    };
    descriptor.packages.extend(packages);
    descriptor.main_class = main_class;
    Ok(descriptor)
}

fn parse_module_attribute(attr: &mut ClassReader<'_>, pool: &Pool) -> ClassResult<ModuleDescriptor> {
    let name = pool.module_name(attr.u2()?)?;
    let mut descriptor = ModuleDescriptor::new(name)
        .map_err(|_| ClassFormatError("module name is empty".to_string()))?;
    let flags = attr.u2()?;
    descriptor.open = flags & ACC_OPEN != 0;
    let version_index = attr.u2()?;
    if version_index != 0 {
        descriptor.version = Some(pool.utf8(version_index)?.to_string());
    }

    let requires = attr.u2()?;
    for _ in 0..requires {
        let module = pool.module_name(attr.u2()?)?;
        let modifiers = RequiresModifiers::from_bits_truncate(attr.u2()?);
        let _version = attr.u2()?;
        descriptor.add_requires(module, modifiers);
    }

    let exports = attr.u2()?;
    for _ in 0..exports {
        let package = pool.package_name(attr.u2()?)?;
        let _flags = attr.u2()?;
        let targets = attr.u2()? as usize;
        attr.take(targets * 2)?;
        if targets == 0 {
            descriptor.exports.insert(package.clone());
        }
        descriptor.packages.insert(package);
    }

    let opens = attr.u2()?;
    for _ in 0..opens {
        let package = pool.package_name(attr.u2()?)?;
        let _flags = attr.u2()?;
        let targets = attr.u2()? as usize;
        attr.take(targets * 2)?;
        if targets == 0 {
            descriptor.opens.insert(package.clone());
        }
        descriptor.packages.insert(package);
    }

    let uses = attr.u2()?;
    for _ in 0..uses {
        descriptor.uses.insert(pool.class_name(attr.u2()?)?);
    }

    let provides = attr.u2()?;
    for _ in 0..provides {
        let service = pool.class_name(attr.u2()?)?;
        let with = attr.u2()?;
        for _ in 0..with {
            let provider = pool.class_name(attr.u2()?)?;
            descriptor.add_provider(service.clone(), provider);
        }
    }
    Ok(descriptor)
}

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    next: u16,
    index: HashMap<(u8, String), u16>,
}

impl PoolWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            index: HashMap::new(),
        }
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let key = (TAG_UTF8, value.to_string());
        if let Some(index) = self.index.get(&key) {
            return *index;
        }
        self.bytes.push(TAG_UTF8);
        self.bytes
            .extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(value.as_bytes());
        self.insert(key)
    }

    fn named(&mut self, tag: u8, value: &str) -> u16 {
        let key = (tag, value.to_string());
        if let Some(index) = self.index.get(&key) {
            return *index;
        }
        let name = self.utf8(value);
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&name.to_be_bytes());
        self.insert(key)
    }

    fn class(&mut self, binary_name: &str) -> u16 {
        self.named(TAG_CLASS, &binary_name.replace('.', "/"))
    }

    fn module(&mut self, name: &str) -> u16 {
        self.named(TAG_MODULE, name)
    }

    fn package(&mut self, name: &str) -> u16 {
        self.named(TAG_PACKAGE, &name.replace('.', "/"))
    }

    fn insert(&mut self, key: (u8, String)) -> u16 {
        let index = self.next;
        self.index.insert(key, index);
        self.next += 1;
        index
    }
}

fn push_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_attribute(out: &mut Vec<u8>, name: u16, body: &[u8]) {
    push_u2(out, name);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
}

/// Encodes a descriptor as a `module-info.class` (class-file version 53).
///
/// A mandated `requires java.base` is added when missing, as the JVM insists
/// on it for every module other than `java.base` itself. Output is a pure
/// function of the descriptor.
pub fn encode_module_info(descriptor: &ModuleDescriptor) -> Vec<u8> {
    let mut pool = PoolWriter::new();
    let this_class = pool.class("module-info");

    let mut requires = descriptor.requires.clone();
    if descriptor.name != "java.base" && !requires.contains_key("java.base") {
        requires.insert("java.base".to_string(), RequiresModifiers::MANDATED);
    }

    let mut module = Vec::new();
    push_u2(&mut module, pool.module(&descriptor.name));
    push_u2(&mut module, if descriptor.open { ACC_OPEN } else { 0 });
    let version = descriptor.version.as_deref().map_or(0, |v| pool.utf8(v));
    push_u2(&mut module, version);

    push_u2(&mut module, requires.len() as u16);
    for (name, modifiers) in &requires {
        push_u2(&mut module, pool.module(name));
        push_u2(&mut module, modifiers.bits());
        push_u2(&mut module, 0);
    }

    push_u2(&mut module, descriptor.exports.len() as u16);
    for package in &descriptor.exports {
        push_u2(&mut module, pool.package(package));
        push_u2(&mut module, 0);
        push_u2(&mut module, 0);
    }

    let opens: Vec<&String> = if descriptor.open {
        Vec::new()
    } else {
        descriptor.opens.iter().collect()
    };
    push_u2(&mut module, opens.len() as u16);
    for package in opens {
        push_u2(&mut module, pool.package(package));
        push_u2(&mut module, 0);
        push_u2(&mut module, 0);
    }

    push_u2(&mut module, descriptor.uses.len() as u16);
    for service in &descriptor.uses {
        push_u2(&mut module, pool.class(service));
    }

    push_u2(&mut module, descriptor.provides.len() as u16);
    for (service, providers) in &descriptor.provides {
        push_u2(&mut module, pool.class(service));
        push_u2(&mut module, providers.len() as u16);
        for provider in providers {
            push_u2(&mut module, pool.class(provider));
        }
    }

    let mut attributes = Vec::new();
    let mut attribute_count = 1u16;
    let module_attr = pool.utf8("Module");
    push_attribute(&mut attributes, module_attr, &module);

    let packages: BTreeSet<&String> = descriptor
        .packages
        .iter()
        .chain(descriptor.exports.iter())
        .chain(descriptor.opens.iter())
        .collect();
    if !packages.is_empty() {
        let mut body = Vec::new();
        push_u2(&mut body, packages.len() as u16);
        for package in packages {
            push_u2(&mut body, pool.package(package));
        }
        let name = pool.utf8("ModulePackages");
        push_attribute(&mut attributes, name, &body);
        attribute_count += 1;
    }

    if let Some(main_class) = &descriptor.main_class {
        let mut body = Vec::new();
        push_u2(&mut body, pool.class(main_class));
        let name = pool.utf8("ModuleMainClass");
        push_attribute(&mut attributes, name, &body);
        attribute_count += 1;
    }

    let mut out = Vec::with_capacity(pool.bytes.len() + attributes.len() + 32);
    out.extend_from_slice(&MAGIC.to_be_bytes());
    push_u2(&mut out, 0);
    push_u2(&mut out, JAVA_9_MAJOR);
    push_u2(&mut out, pool.next);
    out.extend_from_slice(&pool.bytes);
    push_u2(&mut out, ACC_MODULE);
    push_u2(&mut out, this_class);
    push_u2(&mut out, 0);
    push_u2(&mut out, 0);
    push_u2(&mut out, 0);
    push_u2(&mut out, 0);
    push_u2(&mut out, attribute_count);
    out.extend_from_slice(&attributes);
    out
}
