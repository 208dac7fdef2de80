//! Declarative module manifests.
//!
//! A manifest describes modules in YAML instead of code:
//!
//! ```yaml
//! modules:
//!   - name: ProxyModule
//!     actions:
//!       - op: contract
//!         contract: Box
//!       - op: contract
//!         contract: TransparentUpgradeableProxy
//!         args: ["${Box}", "${accounts.0}", "0x"]
//!     outputs:
//!       proxy: "${TransparentUpgradeableProxy}"
//! ```
//!
//! References are written `${name}`:
//! - `${Box}`: an earlier action, by its `as` handle, its `id`, or (for
//!   deployments and bindings) its contract name
//! - `${ProxyModule.proxy}`: an output of a module listed in `uses`
//! - `${accounts.0}`: a signer account
//! - `${params.owner}`: a module parameter, defaulting to the module's
//!   `parameters` entry
//!
//! Any other string is a literal. The loader produces ordinary
//! [`ModuleDefinition`](ignis_core::module::ModuleDefinition)s, so manifests
//! and code-defined modules build and run the same way.

#[allow(clippy::module_inception)]
mod loader;
mod manifest;

pub use loader::{LoadedManifest, ModuleLoader};
pub use manifest::{ActionSpec, Manifest, ModuleSpec};
