//! Module-wide calling-convention option.

use serde::{Deserialize, Serialize};

/// Selects between the two mutually exclusive immediate-byte layouts for
/// the call family. The option applies to a whole module; mixing layouts
/// within one instruction stream is not representable.
///
/// - `Relative`: `CALL` carries a 2-byte signed displacement measured from
///   the call instruction's own address. `CALLDYN` carries no immediate
///   (the target address is popped from the stack). `APPCALL` carries the
///   20-byte receiver hash only.
/// - `Direct`: the call family carries a `[rets u8][args u8]` header.
///   `CALL` appends a 2-byte little-endian absolute address, `CALLDYN`
///   appends nothing, `APPCALL` appends the 20-byte receiver hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallConvention {
    #[default]
    Relative,
    Direct,
}

/// Size of an inter-contract receiver hash in bytes.
pub const HASH_LEN: usize = 20;

/// Name of the fixed event-notification system call.
pub const NOTIFY_SYSCALL: &str = "Tarn.Runtime.Notify";
