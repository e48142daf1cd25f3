//! Compiled, cached accessors for dynamically identified members.
//!
//! Given a member descriptor from a [`hotcall_meta::TypeRegistry`] and the
//! shape a caller wants to call it with, the [`Engine`] validates the pair,
//! builds an invocation plan, lowers it into a specialized closure and
//! caches the result. Repeated requests return the same accessor; calling
//! it never consults the descriptor again.
//!
//! ```
//! use std::sync::Arc;
//! use hotcall::Engine;
//! use hotcall_meta::{TyId, TypeRegistry, Value};
//!
//! let mut types = TypeRegistry::new();
//! let calc = types.define_class("Calc", None, &[]).unwrap();
//! let add = types
//!     .method(calc, "add", &[TyId::INT, TyId::INT], TyId::INT, |_, args| {
//!         Ok(Value::Int(args[0].as_int().unwrap() + args[1].as_int().unwrap()))
//!     })
//!     .unwrap();
//! let obj = Value::Object(types.allocator(calc).unwrap().alloc());
//!
//! let engine = Engine::new(Arc::new(types));
//! let add = engine.compile_method::<Value, i64, 2>(&add).unwrap();
//! assert_eq!(add.call(&obj, [Value::Int(2), Value::Int(3)]).unwrap(), 5);
//! ```

pub mod accessor;
pub mod cache;
mod compile;
pub mod config;
pub mod engine;
pub mod error;
mod plan;
pub mod shape;
mod validate;

pub use accessor::{
    AccessorPair, Action, Constructor, DynConstructor, FieldAccessor, Getter, Method,
    PropertyAccessor, Setter, StaticAction, StaticMethod,
};
pub use cache::{AccessorCache, CacheKey, CacheStats};
pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{AccessorHalf, CompileResult, ContractError, InvokeError, InvokeResult, Slot};
pub use shape::{Arity, CallShape, Family, Output, Receiver, ShapeId, MAX_ARITY};
pub use validate::validate;
