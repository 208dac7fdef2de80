//! Testing utilities for running deployments without a real chain.
//!
//! [`MockChain`] is a deterministic in-memory ledger with fault injection
//! and a submission log, so tests can assert on exactly what would have
//! been broadcast.
//!
//! # Example
//!
//! ```ignore
//! use ignis_executor::testing::MockChain;
//!
//! let chain = Arc::new(MockChain::new(2));
//! chain.reject_deployments_of("Box");
//!
//! let executor = Executor::new(ExecutorConfig::default(), chain.clone(), journal);
//! let report = executor.deploy(&proxy_module, BuildContext::default()).await?;
//!
//! assert_eq!(chain.deployments_of("Box"), 0);
//! ```

mod mock_chain;

pub use mock_chain::MockChain;
