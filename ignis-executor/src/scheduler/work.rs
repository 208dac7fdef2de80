//! Turning ready actions into chain work, and running it.

use super::config::ConfirmationPolicy;
use super::state::RunState;
use crate::chain::{ChainAdapter, ChainError, Receipt, TxHandle, TxRequest, TxStatus};
use ignis_core::error::{IgnisError, Result};
use ignis_core::future::{Argument, Future, FutureTable};
use ignis_core::graph::{ActionKind, ActionNode, ActionOperation, DeploymentGraph};
use ignis_core::types::{ActionId, Address, FutureId, TxHash};
use ignis_core::value::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a worker needs, resolved before it is spawned.
#[derive(Debug)]
pub(crate) enum Work {
    Transaction {
        request: TxRequest,
        kind: ActionKind,
    },
    ReadEvent {
        source: SourceReceipt,
        emitter: Option<Address>,
        event: String,
        argument: String,
        index: usize,
    },
    Bind {
        address: Value,
    },
    Encode {
        contract: String,
        method: String,
        args: Vec<Value>,
    },
}

/// Where to find the receipt an event is read from.
#[derive(Debug)]
pub(crate) enum SourceReceipt {
    Known(Box<Receipt>),
    Lookup(TxHash),
}

/// Messages from workers to the executor loop.
#[derive(Debug)]
pub(crate) enum Progress {
    Submitted { action_id: ActionId, handle: TxHandle },
}

/// A worker's result.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) action_id: ActionId,
    pub(crate) tx_hash: Option<TxHash>,
    pub(crate) result: Result<Completed>,
}

#[derive(Debug)]
pub(crate) struct Completed {
    pub(crate) value: Value,
    pub(crate) receipt: Option<Receipt>,
}

/// The account a transaction action sends from.
///
/// `from` must be an address future (an account) or a literal address;
/// without one the default account is used.
pub(crate) fn sender_of(
    node: &ActionNode,
    futures: &FutureTable,
    default_sender: Option<Address>,
) -> Result<Option<Address>> {
    if !node.kind().submits_transaction() {
        return Ok(None);
    }
    match node.operation.sender() {
        Some(from) => {
            let value = futures.resolve_argument(from)?;
            value
                .as_address()
                .map(Some)
                .ok_or_else(|| IgnisError::InvalidInput {
                    action_id: node.id.clone(),
                    cause: format!("sender '{}' is not an address", value),
                })
        }
        None => default_sender
            .map(Some)
            .ok_or_else(|| IgnisError::InvalidInput {
                action_id: node.id.clone(),
                cause: "no default account available to send from".to_string(),
            }),
    }
}

/// Resolve an action's inputs into work for a worker.
pub(crate) fn prepare(
    graph: &DeploymentGraph,
    state: &RunState,
    node: &ActionNode,
    sender: Option<Address>,
) -> Result<Work> {
    let futures = &state.futures;
    let invalid = |cause: String| IgnisError::InvalidInput {
        action_id: node.id.clone(),
        cause,
    };
    let resolve_value = |value: &Option<Argument>| {
        value
            .as_ref()
            .map(|v| futures.resolve_argument(v))
            .transpose()
    };

    match &node.operation {
        ActionOperation::Deploy {
            contract,
            args,
            value,
            ..
        } => {
            let from = sender.ok_or_else(|| invalid("deployment without a sender".into()))?;
            Ok(Work::Transaction {
                request: TxRequest::Deploy {
                    contract: contract.clone(),
                    args: futures.resolve_arguments(args)?,
                    value: resolve_value(value)?,
                    from,
                },
                kind: ActionKind::Deploy,
            })
        }
        ActionOperation::Call {
            contract,
            method,
            args,
            value,
            ..
        } => {
            let from = sender.ok_or_else(|| invalid("call without a sender".into()))?;
            let to = address_of(futures, contract)
                .ok_or_else(|| invalid(format!("call target '{}' is not an address", contract)))?;
            Ok(Work::Transaction {
                request: TxRequest::Call {
                    to,
                    contract: contract_name(graph, contract),
                    method: method.clone(),
                    args: futures.resolve_arguments(args)?,
                    value: resolve_value(value)?,
                    from,
                },
                kind: ActionKind::Call,
            })
        }
        ActionOperation::ReadEventArgument {
            source,
            emitter,
            event,
            argument,
            index,
        } => {
            let producer = graph
                .future(source)
                .and_then(Future::producer)
                .ok_or_else(|| invalid(format!("'{}' is not produced by an action", source)))?;

            let receipt = match (state.receipts.get(producer), state.tx_hashes.get(producer)) {
                (Some(receipt), _) => SourceReceipt::Known(Box::new(receipt.clone())),
                (None, Some(hash)) => SourceReceipt::Lookup(*hash),
                (None, None) => {
                    return Err(invalid(format!(
                        "no transaction recorded for {}",
                        producer
                    )));
                }
            };

            let emitter = match emitter {
                Some(id) => Some(
                    address_of(futures, id)
                        .ok_or_else(|| invalid(format!("emitter '{}' is not an address", id)))?,
                ),
                None => default_emitter(graph, futures, producer, source),
            };

            Ok(Work::ReadEvent {
                source: receipt,
                emitter,
                event: event.clone(),
                argument: argument.clone(),
                index: *index,
            })
        }
        ActionOperation::BindExisting { address, .. } => Ok(Work::Bind {
            address: futures.resolve_argument(address)?,
        }),
        ActionOperation::EncodeCall {
            contract,
            method,
            args,
        } => Ok(Work::Encode {
            contract: contract_name(graph, contract),
            method: method.clone(),
            args: futures.resolve_arguments(args)?,
        }),
    }
}

fn address_of(futures: &FutureTable, id: &FutureId) -> Option<Address> {
    futures.value(id).ok().and_then(Value::as_address)
}

fn contract_name(graph: &DeploymentGraph, id: &FutureId) -> String {
    graph
        .future(id)
        .and_then(Future::contract)
        .unwrap_or("unknown")
        .to_string()
}

/// A deployment's events come from the deployed contract, a call's from
/// the contract it called.
fn default_emitter(
    graph: &DeploymentGraph,
    futures: &FutureTable,
    producer: &ActionId,
    source: &FutureId,
) -> Option<Address> {
    match graph.node(producer).map(|n| &n.operation) {
        Some(ActionOperation::Deploy { .. }) => address_of(futures, source),
        Some(ActionOperation::Call { contract, .. }) => address_of(futures, contract),
        _ => None,
    }
}

/// The value a confirmed transaction resolves its future to: the created
/// address for deployments, the transaction hash for calls.
pub(crate) async fn transaction_result(
    chain: &dyn ChainAdapter,
    action_id: &ActionId,
    kind: ActionKind,
    handle: &TxHandle,
) -> Result<Value> {
    match kind {
        ActionKind::Deploy => chain
            .read_address(handle)
            .await
            .map(Value::address)
            .map_err(|e| IgnisError::Chain {
                action_id: action_id.clone(),
                cause: format!("cannot read deployed address: {}", e),
            }),
        _ => Ok(Value::tx_hash(handle.hash)),
    }
}

/// Wait for a transaction under the confirmation policy.
pub(crate) async fn confirm(
    chain: &dyn ChainAdapter,
    action_id: &ActionId,
    handle: &TxHandle,
    policy: &ConfirmationPolicy,
) -> Result<Receipt> {
    let wait = chain.wait_for_confirmation(
        handle,
        policy.required_confirmations,
        policy.poll_interval,
    );
    let timeout = || IgnisError::ConfirmationTimeout {
        action_id: action_id.clone(),
        tx_hash: handle.hash,
        timeout_ms: policy.timeout_ms(),
    };

    let receipt = match tokio::time::timeout(policy.timeout, wait).await {
        Ok(Ok(receipt)) => receipt,
        Ok(Err(ChainError::Timeout(_))) | Err(_) => return Err(timeout()),
        Ok(Err(e)) => {
            return Err(IgnisError::Chain {
                action_id: action_id.clone(),
                cause: e.to_string(),
            });
        }
    };

    if !receipt.success {
        return Err(IgnisError::TransactionReverted {
            action_id: action_id.clone(),
            tx_hash: handle.hash,
            reason: receipt
                .revert_reason
                .clone()
                .unwrap_or_else(|| "no reason given".to_string()),
        });
    }
    Ok(receipt)
}

/// Run one action against the chain.
pub(crate) async fn perform(
    chain: Arc<dyn ChainAdapter>,
    policy: ConfirmationPolicy,
    action_id: ActionId,
    work: Work,
    progress: mpsc::UnboundedSender<Progress>,
) -> Outcome {
    match work {
        Work::Transaction { request, kind } => {
            tracing::debug!(request = %request.describe(), "Submitting transaction");
            let handle = match chain.submit(request).await {
                Ok(handle) => handle,
                Err(e) => {
                    let error = IgnisError::Submission {
                        action_id: action_id.clone(),
                        cause: e.to_string(),
                    };
                    return Outcome {
                        action_id,
                        tx_hash: None,
                        result: Err(error),
                    };
                }
            };

            // The loop journals Submitted before it sees this task's outcome.
            let _ = progress.send(Progress::Submitted {
                action_id: action_id.clone(),
                handle,
            });

            let result = settle(chain.as_ref(), &action_id, kind, &handle, &policy).await;

            Outcome {
                action_id,
                tx_hash: Some(handle.hash),
                result,
            }
        }
        Work::ReadEvent {
            source,
            emitter,
            event,
            argument,
            index,
        } => {
            let result = read_event(chain.as_ref(), &action_id, source, emitter, &event, &argument, index)
                .await
                .map(|value| Completed {
                    value,
                    receipt: None,
                });
            Outcome {
                action_id,
                tx_hash: None,
                result,
            }
        }
        Work::Bind { address } => {
            let result = match address.as_address() {
                Some(address) => Ok(Completed {
                    value: Value::address(address),
                    receipt: None,
                }),
                None => Err(IgnisError::InvalidInput {
                    action_id: action_id.clone(),
                    cause: format!("'{}' is not an address", address),
                }),
            };
            Outcome {
                action_id,
                tx_hash: None,
                result,
            }
        }
        Work::Encode {
            contract,
            method,
            args,
        } => {
            let result = chain
                .encode_call(&contract, &method, &args)
                .map(|value| Completed {
                    value,
                    receipt: None,
                })
                .map_err(|e| IgnisError::Chain {
                    action_id: action_id.clone(),
                    cause: format!("cannot encode {}.{}: {}", contract, method, e),
                });
            Outcome {
                action_id,
                tx_hash: None,
                result,
            }
        }
    }
}

async fn settle(
    chain: &dyn ChainAdapter,
    action_id: &ActionId,
    kind: ActionKind,
    handle: &TxHandle,
    policy: &ConfirmationPolicy,
) -> Result<Completed> {
    let receipt = confirm(chain, action_id, handle, policy).await?;
    let value = transaction_result(chain, action_id, kind, handle).await?;
    Ok(Completed {
        value,
        receipt: Some(receipt),
    })
}

async fn read_event(
    chain: &dyn ChainAdapter,
    action_id: &ActionId,
    source: SourceReceipt,
    emitter: Option<Address>,
    event: &str,
    argument: &str,
    index: usize,
) -> Result<Value> {
    let receipt = match source {
        SourceReceipt::Known(receipt) => *receipt,
        SourceReceipt::Lookup(hash) => match chain.transaction_status(&hash).await {
            Ok(TxStatus::Mined { receipt, .. }) => receipt,
            Ok(other) => {
                return Err(IgnisError::Chain {
                    action_id: action_id.clone(),
                    cause: format!("receipt of {} unavailable ({:?})", hash, other),
                });
            }
            Err(e) => {
                return Err(IgnisError::Chain {
                    action_id: action_id.clone(),
                    cause: e.to_string(),
                });
            }
        },
    };

    let not_found = || IgnisError::EventNotFound {
        action_id: action_id.clone(),
        event: event.to_string(),
    };
    let logs = match chain.decode_event(&receipt, emitter, event) {
        Ok(logs) => logs,
        Err(ChainError::NotFound(_)) => return Err(not_found()),
        Err(e) => {
            return Err(IgnisError::Chain {
                action_id: action_id.clone(),
                cause: e.to_string(),
            });
        }
    };

    let log = logs.get(index).ok_or_else(not_found)?;
    log.args
        .get(argument)
        .cloned()
        .ok_or_else(|| IgnisError::ArgumentNotFound {
            action_id: action_id.clone(),
            event: event.to_string(),
            argument: argument.to_string(),
        })
}
