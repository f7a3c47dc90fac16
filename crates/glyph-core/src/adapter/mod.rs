//! Language adapters.
//!
//! ```text
//! Dispatcher
//!     |
//!     v
//! AdapterRegistry --get(LanguageId)--> &dyn Adapter
//!     |                                   |
//!     |   BqnAdapter -----> glyph_bqn::Engine (in-process)
//!     |   Apl/J/Uiua/Kap/TinyApl
//!     |        |
//!     |        v
//!     |   External --resolve--> Prober
//!     |        |
//!     |        v
//!     |   process::run --> Captured --extract--> ExecutionResult
//! ```

pub mod apl;
pub mod bqn;
pub mod external;
pub mod j;
pub mod kap;
pub mod registry;
pub mod tinyapl;
pub mod trait_def;
pub mod uiua;

pub use apl::AplAdapter;
pub use bqn::BqnAdapter;
pub use external::{Captured, External};
pub use j::JAdapter;
pub use kap::KapAdapter;
pub use registry::AdapterRegistry;
pub use tinyapl::TinyAplAdapter;
pub use trait_def::Adapter;
pub use uiua::UiuaAdapter;
