//! Model definitions and the rebuild procedure.
//!
//! ```no_run
//! use limsa_core::MemoryStore;
//! use limsa_provision::{rebuild, ModelDefinition, RebuildOptions};
//!
//! let definition = ModelDefinition::builtin()?;
//! let mut store = MemoryStore::new();
//! let outcome = rebuild(&definition, &mut store, &RebuildOptions::default())?;
//! println!("{}", outcome.export.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod definitions;
pub mod error;
pub mod rebuild;

pub use definitions::{
    ChainDefinition, InputDefinition, InputSource, InteractionDefinition, ModelDefinition,
    ReferenceDefinition, Settings, TransitionDefinition, TransitionKind, BUILTIN_LIMSA_TB,
};
pub use error::{ProvisionError, Result};
pub use rebuild::{rebuild, RebuildOptions, RebuildOutcome};
