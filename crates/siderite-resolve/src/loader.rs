//! The module loader contract, the process-wide cache, and the file-backed
//! loader for serialized module surfaces.
//!
//! A serialized module (`<name>.smod`) is a postcard-encoded [`ModuleImage`]
//! wrapped in a 4-byte magic, a format-version byte, and a trailing crc32.
//! The image records only the public surface a `use` can see; bodies never
//! leave their compilation unit.

use std::fs::File;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use siderite_asr::{
    Access, Asr, Expr, Function, FunctionType, DefKind, GenericProcedure, Intent, Module,
    Presence, StringLength, StringPhysical, Symbol, SymbolId, TableId, Ty, Variable,
};
use siderite_core::{Diagnostics, Span};

const MAGIC: &[u8; 4] = b"SMOD";
const FORMAT_VERSION: u8 = 1;

/// Loading failures, surfaced to the resolver as diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("module `{0}` not found")]
    NotFound(String),
    #[error("import cycle through module `{0}`")]
    Cycle(String),
    #[error("module file for `{0}` is malformed: {1}")]
    Format(String, String),
    #[error("reading module `{0}` failed: {1}")]
    Io(String, String),
}

/// Serialization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SaveError {
    #[error("`{0}` cannot be serialized into a module image")]
    Unsupported(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Loads a module's public surface into the arena on behalf of the
/// resolver. Must be idempotent and cached by canonical module name.
pub trait ModuleLoader {
    fn load_module(
        &mut self,
        name: &str,
        span: Span,
        asr: &mut Asr,
        global: TableId,
        diag: &mut Diagnostics,
    ) -> Result<SymbolId, LoadError>;
}

/// A loader for single-unit compilation: every request misses.
#[derive(Debug, Default)]
pub struct NullLoader;

impl ModuleLoader for NullLoader {
    fn load_module(
        &mut self,
        name: &str,
        _span: Span,
        _asr: &mut Asr,
        _global: TableId,
        _diag: &mut Diagnostics,
    ) -> Result<SymbolId, LoadError> {
        Err(LoadError::NotFound(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
enum CacheState {
    /// Sentinel placed before materialisation so re-entrant requests
    /// surface as a cycle instead of recursing forever.
    Loading,
    Loaded(SymbolId),
}

/// Process-lifetime cache keyed by canonical module name.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: IndexMap<String, CacheState>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<Result<SymbolId, LoadError>> {
        match self.entries.get(name) {
            Some(CacheState::Loaded(id)) => Some(Ok(*id)),
            Some(CacheState::Loading) => Some(Err(LoadError::Cycle(name.to_string()))),
            None => None,
        }
    }

    pub fn begin(&mut self, name: &str) {
        self.entries.insert(name.to_string(), CacheState::Loading);
    }

    pub fn finish(&mut self, name: &str, id: SymbolId) {
        self.entries
            .insert(name.to_string(), CacheState::Loaded(id));
    }

    /// Remove a failed load's sentinel so a later attempt can retry.
    pub fn cancel(&mut self, name: &str) {
        self.entries.shift_remove(name);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ----------------------------------------------------------------------
// Module images
// ----------------------------------------------------------------------

/// The serialized public surface of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleImage {
    pub name: String,
    pub symbols: Vec<SymbolImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolImage {
    Function {
        name: String,
        args: Vec<ArgImage>,
        ret: Option<TyImage>,
    },
    Variable {
        name: String,
        ty: TyImage,
    },
    Generic {
        name: String,
        procs: Vec<String>,
    },
    Operator {
        name: String,
        procs: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgImage {
    pub name: String,
    pub ty: TyImage,
    pub optional: bool,
}

/// The scalar subset a module surface may expose across units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TyImage {
    Integer(u8),
    Real(u8),
    Complex(u8),
    Logical(u8),
    /// Fixed-length character; the length is part of the image.
    Character(u32),
}

fn ty_to_image(ty: &Ty, owner: &str) -> Result<TyImage, SaveError> {
    match ty {
        Ty::Integer { kind } => Ok(TyImage::Integer(*kind)),
        Ty::Real { kind } => Ok(TyImage::Real(*kind)),
        Ty::Complex { kind } => Ok(TyImage::Complex(*kind)),
        Ty::Logical { kind } => Ok(TyImage::Logical(*kind)),
        Ty::Character {
            len: StringLength::Expression(e),
            ..
        } => match &**e {
            Expr::IntConstant { value, .. } if *value >= 0 => {
                Ok(TyImage::Character(*value as u32))
            }
            _ => Err(SaveError::Unsupported(owner.to_string())),
        },
        _ => Err(SaveError::Unsupported(owner.to_string())),
    }
}

fn ty_from_image(image: TyImage, span: Span) -> Ty {
    match image {
        TyImage::Integer(kind) => Ty::Integer { kind },
        TyImage::Real(kind) => Ty::Real { kind },
        TyImage::Complex(kind) => Ty::Complex { kind },
        TyImage::Logical(kind) => Ty::Logical { kind },
        TyImage::Character(len) => Ty::Character {
            len: StringLength::Expression(Box::new(Expr::int(len as i64, span))),
            kind: 1,
            physical: StringPhysical::Descriptor,
        },
    }
}

/// Serialize a module's public surface: magic, version, postcard payload,
/// crc32 trailer.
pub fn save_module(asr: &Asr, module: SymbolId) -> Result<Vec<u8>, SaveError> {
    let Symbol::Module(m) = asr.symbol(module) else {
        return Err(SaveError::Unsupported("not a module".to_string()));
    };

    let mut symbols = Vec::new();
    for (name, sym) in asr.table(m.table).iter() {
        let sym = asr.symbol(sym);
        if sym.access() == Access::Private {
            continue;
        }
        match sym {
            Symbol::Function(f) => {
                let mut args = Vec::new();
                for arg in &f.args {
                    let Expr::Var { sym, .. } = arg else {
                        return Err(SaveError::Unsupported(name.to_string()));
                    };
                    let Symbol::Variable(v) = asr.symbol(*sym) else {
                        return Err(SaveError::Unsupported(name.to_string()));
                    };
                    args.push(ArgImage {
                        name: v.name.clone(),
                        ty: ty_to_image(&v.ty, name)?,
                        optional: v.presence == Presence::Optional,
                    });
                }
                let ret = match &f.signature.return_type {
                    Some(ty) => Some(ty_to_image(ty, name)?),
                    None => None,
                };
                symbols.push(SymbolImage::Function {
                    name: f.name.clone(),
                    args,
                    ret,
                });
            }
            Symbol::Variable(v) => symbols.push(SymbolImage::Variable {
                name: v.name.clone(),
                ty: ty_to_image(&v.ty, name)?,
            }),
            Symbol::GenericProcedure(g) => symbols.push(SymbolImage::Generic {
                name: g.name.clone(),
                procs: proc_name_list(asr, &g.procs),
            }),
            Symbol::CustomOperator(c) => symbols.push(SymbolImage::Operator {
                name: c.name.clone(),
                procs: proc_name_list(asr, &c.procs),
            }),
            // Bodies, structs, and nested scopes stay in their own unit.
            _ => {}
        }
    }

    let image = ModuleImage {
        name: m.name.clone(),
        symbols,
    };
    let payload =
        postcard::to_allocvec(&image).map_err(|e| SaveError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(payload.len() + 9);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&payload);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&out);
    out.extend_from_slice(&hasher.finalize().to_le_bytes());
    Ok(out)
}

fn proc_name_list(asr: &Asr, procs: &[SymbolId]) -> Vec<String> {
    procs
        .iter()
        .filter_map(|p| asr.symbol(asr.get_past_external(*p)).name())
        .map(str::to_string)
        .collect()
}

/// Decode bytes produced by [`save_module`].
pub fn decode_module(name: &str, bytes: &[u8]) -> Result<ModuleImage, LoadError> {
    let malformed = |why: &str| LoadError::Format(name.to_string(), why.to_string());

    if bytes.len() < MAGIC.len() + 1 + 4 {
        return Err(malformed("file too short"));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    let expected: [u8; 4] = trailer.try_into().expect("split kept 4 bytes");
    if hasher.finalize().to_le_bytes() != expected {
        return Err(malformed("checksum mismatch"));
    }
    if &body[..4] != MAGIC {
        return Err(malformed("bad magic"));
    }
    if body[4] != FORMAT_VERSION {
        return Err(malformed("unsupported format version"));
    }
    postcard::from_bytes(&body[5..]).map_err(|e| malformed(&e.to_string()))
}

/// Materialise a decoded image into the arena as a loaded module bound in
/// the global table.
pub fn materialize_module(
    asr: &mut Asr,
    global: TableId,
    image: &ModuleImage,
    span: Span,
) -> Result<SymbolId, LoadError> {
    let table = asr.new_table(Some(global));
    let module = asr
        .add_symbol(
            global,
            &image.name,
            Symbol::Module(Module {
                name: siderite_core::names::canonical(&image.name),
                table,
                dependencies: Vec::new(),
                parent_module: None,
                has_submodules: false,
                span,
            }),
        )
        .map_err(|e| LoadError::Format(image.name.clone(), e.to_string()))?;
    asr.set_table_owner(table, module);

    // Two passes: functions and variables first, aggregates after, so
    // constituent names resolve.
    for sym in &image.symbols {
        match sym {
            SymbolImage::Function { name, args, ret } => {
                materialize_function(asr, table, name, args, ret.as_ref(), span)
                    .map_err(|e| LoadError::Format(image.name.clone(), e.to_string()))?;
            }
            SymbolImage::Variable { name, ty } => {
                asr.add_symbol(
                    table,
                    name,
                    Symbol::Variable(Variable {
                        name: siderite_core::names::canonical(name),
                        parent: table,
                        ty: ty_from_image(*ty, span),
                        init: None,
                        value: None,
                        intent: Intent::Local,
                        storage: Default::default(),
                        access: Access::Public,
                        presence: Presence::Required,
                        dependencies: Vec::new(),
                        type_decl: None,
                        span,
                    }),
                )
                .map_err(|e| LoadError::Format(image.name.clone(), e.to_string()))?;
            }
            SymbolImage::Generic { .. } | SymbolImage::Operator { .. } => {}
        }
    }
    for sym in &image.symbols {
        let (name, procs, is_operator) = match sym {
            SymbolImage::Generic { name, procs } => (name, procs, false),
            SymbolImage::Operator { name, procs } => (name, procs, true),
            _ => continue,
        };
        let mut ids = Vec::new();
        for proc in procs {
            let Some(id) = asr.get_symbol(table, proc) else {
                return Err(LoadError::Format(
                    image.name.clone(),
                    format!("aggregate `{name}` references missing `{proc}`"),
                ));
            };
            ids.push(id);
        }
        let key = siderite_core::names::canonical(name);
        let symbol = if is_operator {
            Symbol::CustomOperator(siderite_asr::CustomOperator {
                name: key.clone(),
                parent: table,
                procs: ids,
                access: Access::Public,
                span,
            })
        } else {
            Symbol::GenericProcedure(GenericProcedure {
                name: key.clone(),
                parent: table,
                procs: ids,
                access: Access::Public,
                span,
            })
        };
        asr.add_symbol(table, &key, symbol)
            .map_err(|e| LoadError::Format(image.name.clone(), e.to_string()))?;
    }

    Ok(module)
}

fn materialize_function(
    asr: &mut Asr,
    parent: TableId,
    name: &str,
    args: &[ArgImage],
    ret: Option<&TyImage>,
    span: Span,
) -> Result<SymbolId, siderite_asr::StoreError> {
    let table = asr.new_table(Some(parent));

    let mut arg_exprs = Vec::new();
    let mut arg_types = Vec::new();
    for arg in args {
        let ty = ty_from_image(arg.ty, span);
        let var = asr.add_symbol(
            table,
            &arg.name,
            Symbol::Variable(Variable {
                name: siderite_core::names::canonical(&arg.name),
                parent: table,
                ty: ty.clone(),
                init: None,
                value: None,
                intent: Intent::In,
                storage: Default::default(),
                access: Default::default(),
                presence: if arg.optional {
                    Presence::Optional
                } else {
                    Presence::Required
                },
                dependencies: Vec::new(),
                type_decl: None,
                span,
            }),
        )?;
        arg_exprs.push(Expr::Var { sym: var, span });
        arg_types.push(ty);
    }

    let return_ty = ret.map(|ty| ty_from_image(*ty, span));
    let return_var = match &return_ty {
        Some(ty) => Some(asr.add_symbol(
            table,
            &format!("{name}_return"),
            Symbol::Variable(Variable {
                name: format!("{}_return", siderite_core::names::canonical(name)),
                parent: table,
                ty: ty.clone(),
                init: None,
                value: None,
                intent: Intent::ReturnVar,
                storage: Default::default(),
                access: Default::default(),
                presence: Presence::Required,
                dependencies: Vec::new(),
                type_decl: None,
                span,
            }),
        )?),
        None => None,
    };

    let id = asr.add_symbol(
        parent,
        name,
        Symbol::Function(Function {
            name: siderite_core::names::canonical(name),
            table,
            args: arg_exprs,
            body: Vec::new(),
            return_var,
            signature: FunctionType {
                arg_types,
                return_type: return_ty,
                deftype: DefKind::Interface,
                ..FunctionType::default()
            },
            dependencies: Vec::new(),
            access: Access::Public,
            span,
        }),
    )?;
    asr.set_table_owner(table, id);
    Ok(id)
}

// ----------------------------------------------------------------------
// File-backed loader
// ----------------------------------------------------------------------

/// Looks for `<name>.smod` files on a search path, verifies and decodes
/// them, and materialises the result. Loads are cached for the lifetime of
/// the loader.
#[derive(Debug, Default)]
pub struct FileModuleLoader {
    search_paths: Vec<PathBuf>,
    cache: ModuleCache,
}

impl FileModuleLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            cache: ModuleCache::new(),
        }
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn cache_mut(&mut self) -> &mut ModuleCache {
        &mut self.cache
    }

    fn find_file(&self, name: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| dir.join(format!("{name}.smod")))
            .find(|p| p.is_file())
    }

    fn read_image(&self, name: &str, path: &Path) -> Result<ModuleImage, LoadError> {
        let file = File::open(path)
            .map_err(|e| LoadError::Io(name.to_string(), e.to_string()))?;
        // Safety: the mapping is read-only and dropped before this call
        // returns anything borrowed from it.
        let map = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| LoadError::Io(name.to_string(), e.to_string()))?;
        decode_module(name, &map)
    }
}

impl ModuleLoader for FileModuleLoader {
    fn load_module(
        &mut self,
        name: &str,
        span: Span,
        asr: &mut Asr,
        global: TableId,
        _diag: &mut Diagnostics,
    ) -> Result<SymbolId, LoadError> {
        let key = siderite_core::names::canonical(name);
        if let Some(cached) = self.cache.lookup(&key) {
            return cached;
        }

        self.cache.begin(&key);
        let result = (|| {
            let path = self
                .find_file(&key)
                .ok_or_else(|| LoadError::NotFound(key.clone()))?;
            let image = self.read_image(&key, &path)?;
            materialize_module(asr, global, &image, span)
        })();

        match &result {
            Ok(id) => self.cache.finish(&key, *id),
            Err(_) => self.cache.cancel(&key),
        }
        result
    }
}
