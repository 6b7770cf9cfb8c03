//! Gate kinds and gate applications.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::qubit::QubitId;

/// Operations a logical circuit may contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateKind {
    // Single-qubit gates
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// T gate (fourth root of Z).
    T,
    /// Rotation around X axis.
    Rx(f64),
    /// Rotation around Y axis.
    Ry(f64),
    /// Rotation around Z axis.
    Rz(f64),
    /// Phase gate.
    P(f64),
    /// Computational-basis measurement.
    Measure,

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// Controlled phase gate.
    CP(f64),
    /// SWAP gate.
    Swap,

    // Multi-qubit gates
    /// Toffoli gate (CCX).
    CCX,
    /// Multi-controlled X with `controls` control qubits followed by one target.
    Mcx {
        /// Number of control qubits.
        controls: u32,
    },
}

impl GateKind {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            GateKind::I => "id",
            GateKind::X => "x",
            GateKind::Y => "y",
            GateKind::Z => "z",
            GateKind::H => "h",
            GateKind::S => "s",
            GateKind::T => "t",
            GateKind::Rx(_) => "rx",
            GateKind::Ry(_) => "ry",
            GateKind::Rz(_) => "rz",
            GateKind::P(_) => "p",
            GateKind::Measure => "measure",
            GateKind::CX => "cx",
            GateKind::CY => "cy",
            GateKind::CZ => "cz",
            GateKind::CP(_) => "cp",
            GateKind::Swap => "swap",
            GateKind::CCX => "ccx",
            GateKind::Mcx { .. } => "mcx",
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            GateKind::I
            | GateKind::X
            | GateKind::Y
            | GateKind::Z
            | GateKind::H
            | GateKind::S
            | GateKind::T
            | GateKind::Rx(_)
            | GateKind::Ry(_)
            | GateKind::Rz(_)
            | GateKind::P(_)
            | GateKind::Measure => 1,

            GateKind::CX | GateKind::CY | GateKind::CZ | GateKind::CP(_) | GateKind::Swap => 2,

            GateKind::CCX => 3,
            GateKind::Mcx { controls } => controls.saturating_add(1),
        }
    }

    /// Whether this is a controlled operation (first operands are controls).
    pub fn is_controlled(&self) -> bool {
        matches!(
            self,
            GateKind::CX
                | GateKind::CY
                | GateKind::CZ
                | GateKind::CP(_)
                | GateKind::CCX
                | GateKind::Mcx { .. }
        )
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateKind::Rx(theta) | GateKind::Ry(theta) | GateKind::Rz(theta) => {
                write!(f, "{}({theta:.4})", self.name())
            }
            GateKind::P(lambda) | GateKind::CP(lambda) => write!(f, "{}({lambda:.4})", self.name()),
            GateKind::Mcx { controls } => write!(f, "mcx[{controls}]"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// A gate applied to specific logical qubits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// What the gate does.
    pub kind: GateKind,
    /// Operands, controls first for controlled gates.
    pub qubits: Vec<QubitId>,
}

impl Gate {
    /// Create a gate, checking arity and operand uniqueness.
    pub fn new(kind: GateKind, qubits: impl Into<Vec<QubitId>>) -> IrResult<Self> {
        let gate = Self {
            kind,
            qubits: qubits.into(),
        };
        gate.check()?;
        Ok(gate)
    }

    /// Create a single-qubit gate.
    pub fn single(kind: GateKind, qubit: QubitId) -> IrResult<Self> {
        Self::new(kind, vec![qubit])
    }

    /// Create a two-qubit gate.
    pub fn two(kind: GateKind, q0: QubitId, q1: QubitId) -> IrResult<Self> {
        Self::new(kind, vec![q0, q1])
    }

    /// Validate arity and duplicate operands.
    pub(crate) fn check(&self) -> IrResult<()> {
        let expected = self.kind.num_qubits();
        if self.qubits.len() != expected as usize {
            return Err(IrError::QubitCountMismatch {
                gate_name: self.kind.name().to_string(),
                expected,
                got: self.qubits.len() as u32,
            });
        }
        for (i, q) in self.qubits.iter().enumerate() {
            if self.qubits[..i].contains(q) {
                return Err(IrError::DuplicateQubit {
                    qubit: *q,
                    gate_name: Some(self.kind.name().to_string()),
                });
            }
        }
        Ok(())
    }

    /// Number of operands.
    #[inline]
    pub fn arity(&self) -> usize {
        self.qubits.len()
    }

    /// Whether the gate touches more than one qubit.
    #[inline]
    pub fn is_multi_qubit(&self) -> bool {
        self.qubits.len() > 1
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        for (i, q) in self.qubits.iter().enumerate() {
            if i == 0 {
                write!(f, " {q}")?;
            } else {
                write!(f, ", {q}")?;
            }
        }
        Ok(())
    }
}
