//! Operation kinds shared between the vault and routers

use serde::{Deserialize, Serialize};

/// Which side of a swap the caller fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapKind {
    /// Caller fixes the amount in; the pool computes the amount out
    ExactIn,
    /// Caller fixes the amount out; the pool computes the amount in
    ExactOut,
}

impl SwapKind {
    pub fn opposite(self) -> Self {
        match self {
            SwapKind::ExactIn => SwapKind::ExactOut,
            SwapKind::ExactOut => SwapKind::ExactIn,
        }
    }
}

/// Rounding direction requested from pool math
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rounding {
    RoundUp,
    RoundDown,
}

/// Direction of an ERC4626 buffer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrappingDirection {
    /// Underlying in, wrapped out
    Wrap,
    /// Wrapped in, underlying out
    Unwrap,
}

/// Pool liquidity addition variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddLiquidityKind {
    /// Exact BPT out, token amounts in proportion to balances
    Proportional,
    /// Exact token amounts in, BPT out computed from the invariant
    Unbalanced,
    /// Exact BPT out, paid in a single token
    SingleTokenExactOut,
}

/// Pool liquidity removal variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoveLiquidityKind {
    /// Exact BPT in, token amounts out in proportion to balances
    Proportional,
    /// Exact BPT in, paid out in a single token
    SingleTokenExactIn,
    /// Exact single token amount out, BPT in computed from the invariant
    SingleTokenExactOut,
}
