// demangle.rs — Function symbol to entity name
//
// Itanium-mangled symbols (`_Z…`) are demangled without parameter or return
// types and then normalized into a VHDL identifier. Plain C symbols only go
// through normalization.
//
// Preconditions: none.
// Postconditions: the returned entity name is a VHDL basic identifier.
// Failure modes: a `_Z` symbol that does not demangle yields W0101 and falls
//                back to the raw symbol.
// Side effects: none.

use cpp_demangle::{DemangleOptions, Symbol};

use crate::diag::{codes, Diagnostic};
use crate::ir::Span;
use crate::resolve::signal_name;

fn is_mangled(symbol: &str) -> bool {
    symbol.starts_with("_Z")
}

/// Human-readable name of `symbol`, e.g. `ns::add` for `_ZN2ns3addEii`.
/// `None` if the symbol is mangled but malformed.
pub fn demangle(symbol: &str) -> Option<String> {
    if !is_mangled(symbol) {
        return Some(symbol.to_string());
    }
    let parsed = Symbol::new(symbol).ok()?;
    let options = DemangleOptions::new().no_params().no_return_type();
    parsed.demangle(&options).ok()
}

/// Demangled name, or the raw symbol when demangling fails. Used for
/// reports where no diagnostic is wanted.
pub fn display_name(symbol: &str) -> String {
    demangle(symbol).unwrap_or_else(|| symbol.to_string())
}

/// Entity name for the function `symbol`, plus a warning if the symbol
/// could not be demangled.
pub fn entity_name(symbol: &str, span: Span) -> (String, Option<Diagnostic>) {
    match demangle(symbol) {
        Some(name) => (signal_name(&name), None),
        None => {
            let warning = Diagnostic::warning(
                span,
                format!("could not demangle '{symbol}', using the raw symbol"),
            )
            .with_code(codes::W0101);
            (signal_name(symbol), Some(warning))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        use chumsky::span::Span as _;
        Span::new((), 0..0)
    }

    #[test]
    fn plain_symbol_unchanged() {
        let (name, warning) = entity_name("f", span());
        assert_eq!(name, "f");
        assert!(warning.is_none());
    }

    #[test]
    fn plain_symbol_normalized() {
        assert_eq!(entity_name("foo.cold", span()).0, "foo_cold");
    }

    #[test]
    fn mangled_function() {
        assert_eq!(demangle("_Z3addii").as_deref(), Some("add"));
        let (name, warning) = entity_name("_Z3addii", span());
        assert_eq!(name, "add");
        assert!(warning.is_none());
    }

    #[test]
    fn namespaced_function() {
        assert_eq!(demangle("_ZN2hw5mixerEjj").as_deref(), Some("hw::mixer"));
        assert_eq!(entity_name("_ZN2hw5mixerEjj", span()).0, "hw_mixer");
    }

    #[test]
    fn malformed_symbol_warns() {
        let (name, warning) = entity_name("_Z3ad", span());
        assert_eq!(name, "Z3ad");
        let warning = warning.expect("expected W0101");
        assert_eq!(warning.code, Some(codes::W0101));
        assert!(!warning.is_error());
        assert_eq!(display_name("_Z3ad"), "_Z3ad");
    }
}
