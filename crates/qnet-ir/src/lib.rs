//! qnet Logical Circuit Representation
//!
//! This crate provides the logical circuits that the distributed simulator
//! partitions across quantum processing units. A circuit is an ordered list of
//! gates over logical qubit indices; it carries no physical placement and is
//! treated as read-only by the partitioner in `qnet-compile`.
//!
//! # Core Components
//!
//! - **Qubits**: [`QubitId`] addresses a logical qubit by index
//! - **Gates**: [`GateKind`] for the supported operations, [`Gate`] binding a
//!   kind to its operands
//! - **Circuit**: [`Circuit`] builder API plus a small library of algorithm
//!   circuits (GHZ, QFT, Grover)
//!
//! # Example: Building a Bell State
//!
//! ```rust
//! use qnet_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::new("bell", 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.two_qubit_count(), 1);
//! ```
//!
//! # Supported Gates
//!
//! | Gate | Qubits | Description |
//! |------|--------|-------------|
//! | `H` | 1 | Hadamard gate |
//! | `X`, `Y`, `Z` | 1 | Pauli gates |
//! | `S`, `T` | 1 | Phase gates |
//! | `Rx`, `Ry`, `Rz`, `P` | 1 | Rotation gates |
//! | `Measure` | 1 | Computational-basis measurement |
//! | `CX`, `CY`, `CZ` | 2 | Controlled Paulis |
//! | `CP` | 2 | Controlled phase |
//! | `Swap` | 2 | SWAP gate |
//! | `CCX` | 3 | Toffoli gate |
//! | `Mcx` | n | Multi-controlled X |

pub mod circuit;
pub mod error;
pub mod gate;
pub mod qubit;

pub use circuit::Circuit;
pub use error::{IrError, IrResult};
pub use gate::{Gate, GateKind};
pub use qubit::QubitId;
