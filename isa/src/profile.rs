//! ISA profile selection.
//!
//! A profile fixes the register width and the set of enabled extensions for
//! one emulated processor variant. Profiles are zero-sized marker types so
//! the decoder and executor monomorphize per variant; the only runtime
//! dispatch over profiles happens once, at emulator start-up.

use std::fmt;
use std::str::FromStr;

/// Compile-time ISA profile: register width plus extension switches.
///
/// An encoding that is only valid in a disabled extension decodes as
/// illegal under that profile.
pub trait Isa: Copy + Clone + 'static {
    /// Integer register width in bits (32 or 64).
    const XLEN: u32;
    /// Integer multiply/divide (M).
    const RVM: bool;
    /// Atomics (A).
    const RVA: bool;
    /// System instructions, CSR family (S).
    const RVS: bool;
    /// Single-precision floating point (F).
    const RVF: bool;
    /// Double-precision floating point (D).
    const RVD: bool;
    /// Compressed encodings (C).
    const RVC: bool;
}

macro_rules! isa_profile {
    ($(#[$doc:meta])* $name:ident, $xlen:expr, m: $m:expr, a: $a:expr, s: $s:expr, f: $f:expr, d: $d:expr, c: $c:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl Isa for $name {
            const XLEN: u32 = $xlen;
            const RVM: bool = $m;
            const RVA: bool = $a;
            const RVS: bool = $s;
            const RVF: bool = $f;
            const RVD: bool = $d;
            const RVC: bool = $c;
        }
    };
}

isa_profile!(/** RV32IMA */ Rv32Ima, 32, m: true, a: true, s: true, f: false, d: false, c: false);
isa_profile!(/** RV32IMAC */ Rv32Imac, 32, m: true, a: true, s: true, f: false, d: false, c: true);
isa_profile!(/** RV32IMAFD */ Rv32Imafd, 32, m: true, a: true, s: true, f: true, d: true, c: false);
isa_profile!(/** RV32IMAFDC */ Rv32Imafdc, 32, m: true, a: true, s: true, f: true, d: true, c: true);
isa_profile!(/** RV64IMA */ Rv64Ima, 64, m: true, a: true, s: true, f: false, d: false, c: false);
isa_profile!(/** RV64IMAC */ Rv64Imac, 64, m: true, a: true, s: true, f: false, d: false, c: true);
isa_profile!(/** RV64IMAFD */ Rv64Imafd, 64, m: true, a: true, s: true, f: true, d: true, c: false);
isa_profile!(/** RV64IMAFDC */ Rv64Imafdc, 64, m: true, a: true, s: true, f: true, d: true, c: true);

/// Runtime extension-set selector, parsed from the command line. Combined
/// with the ELF class it picks one of the eight [`Isa`] profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsaExt {
    Ima,
    Imac,
    Imafd,
    Imafdc,
}

/// Error returned when an extension-set name is not recognized.
#[derive(Debug, thiserror::Error)]
#[error("unknown isa extension set: {0}")]
pub struct ParseIsaError(String);

impl FromStr for IsaExt {
    type Err = ParseIsaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ima") {
            Ok(IsaExt::Ima)
        } else if s.eq_ignore_ascii_case("imac") {
            Ok(IsaExt::Imac)
        } else if s.eq_ignore_ascii_case("imafd") {
            Ok(IsaExt::Imafd)
        } else if s.eq_ignore_ascii_case("imafdc") {
            Ok(IsaExt::Imafdc)
        } else {
            Err(ParseIsaError(s.to_string()))
        }
    }
}

impl fmt::Display for IsaExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsaExt::Ima => write!(f, "IMA"),
            IsaExt::Imac => write!(f, "IMAC"),
            IsaExt::Imafd => write!(f, "IMAFD"),
            IsaExt::Imafdc => write!(f, "IMAFDC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_isa_ext() {
        assert_eq!("IMA".parse::<IsaExt>().unwrap(), IsaExt::Ima);
        assert_eq!("imafdc".parse::<IsaExt>().unwrap(), IsaExt::Imafdc);
        assert!("IMAFDQ".parse::<IsaExt>().is_err());
    }

    #[test]
    fn profile_consts() {
        assert_eq!(Rv32Imac::XLEN, 32);
        assert!(Rv32Imac::RVC);
        assert!(!Rv32Imac::RVF);
        assert_eq!(Rv64Imafdc::XLEN, 64);
        assert!(Rv64Imafdc::RVD);
    }
}
